/*
 *  main.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Daemon entry point: config, logging, engine on the virtual panel,
 *  gesture polling and graceful shutdown
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use env_logger::Env;
use log::{error, info, warn};
use std::fs;

use tokio::signal::unix::{signal, SignalKind};

use epaperd::config::{self, Cli};
use epaperd::constants::GESTURE_POLL_PERIOD;
use epaperd::display::{Canvas, MockPanel};
use epaperd::engine::Engine;
use epaperd::touch::{GestureEvent, MockTouch};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Border, banner and a status line
fn status_frame(width: u32, height: u32, status: &str) -> Canvas {
    let mut canvas = Canvas::new(width, height);
    let text = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

    let Ok(()) = Rectangle::new(Point::zero(), Size::new(width, height))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 2))
        .draw(&mut canvas);
    let Ok(_) = Text::with_baseline(
        concat!("epaperd v", env!("CARGO_PKG_VERSION")),
        Point::new(8, 8),
        text,
        Baseline::Top,
    )
    .draw(&mut canvas);
    let Ok(_) = Text::with_baseline(status, Point::new(8, 30), text, Baseline::Top).draw(&mut canvas);
    let stamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let Ok(_) = Text::with_baseline(&stamp, Point::new(8, height as i32 - 18), text, Baseline::Top)
        .draw(&mut canvas);
    canvas
}

/// Poll for gestures and reflect each one on screen
async fn gesture_loop(engine: Engine) {
    let window = engine.get_window();
    let mut ticker = tokio::time::interval(GESTURE_POLL_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let report = match engine.detect_interaction().await {
            Ok(report) => report,
            Err(e) if e.is_hardware_fault() => {
                warn!("Touch scan failed: {}", e);
                continue;
            }
            Err(e) => {
                info!("Gesture polling stopped: {}", e);
                return;
            }
        };

        let status = match report.gesture {
            GestureEvent::None => continue,
            GestureEvent::Tap { x, y } => format!("tap at {},{}", x, y),
            GestureEvent::Swipe { direction } => format!("swipe {:?}", direction).to_lowercase(),
        };
        info!("Gesture: {}", status);

        match engine.render_canvas(status_frame(window.width, window.height, &status)).await {
            Ok(outcome) => info!("Rendered gesture frame: {:?}", outcome),
            Err(e) => error!("Render failed: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;
    if cli.dump_config {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_filter()))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {} ({})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    let mut panel = match cfg.panel_size() {
        Some((width, height)) => MockPanel::new_with_size(width, height),
        None => MockPanel::new(),
    };
    if let Some(dir) = cfg.snapshot_dir.as_ref() {
        fs::create_dir_all(dir).with_context(|| format!("creating snapshot dir {}", dir.display()))?;
        info!("Writing frame snapshots to {}", dir.display());
        panel = panel.with_snapshots(dir);
    }

    let engine = Engine::start(panel, MockTouch::new(), cfg.to_timing())
        .await
        .context("starting engine")?;
    let window = engine.get_window();
    info!("Window {}x{}", window.width, window.height);

    let outcome = engine
        .render_canvas(status_frame(window.width, window.height, "ready"))
        .await
        .context("rendering startup frame")?;
    info!("Startup frame: {:?}", outcome);

    let gestures = tokio::spawn(gesture_loop(engine.clone()));

    if let Err(e) = signal_handler().await {
        error!("Signal handler setup failed: {}", e);
    }

    info!("Health at shutdown: {:?}", engine.health());
    let result = engine.shutdown().await;
    gestures.abort();
    result.context("shutting down engine")?;

    info!("Main application exiting.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_frame_draws_border_and_text() {
        let canvas = status_frame(250, 122, "tap at 1,2");
        assert_eq!(canvas.dimensions(), (250, 122));
        assert_eq!(canvas.is_ink(0, 0), Some(true));
        assert_eq!(canvas.is_ink(249, 121), Some(true));
        assert_eq!(canvas.is_ink(125, 60), Some(false));

        // the status line adds ink over a blank one
        let blank = status_frame(250, 122, "");
        assert!(canvas.count_ink_pixels() > blank.count_ink_pixels());
    }
}
