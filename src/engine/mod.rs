/*
 *  engine/mod.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Coordination engine - command surface over the actor and both loops
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

pub mod error;
pub mod health;
pub mod state;
pub mod supervisor;
pub(crate) mod actor;

pub use error::{EngineError, HardwareFault};
pub use health::{EngineHealth, LoopStatus};
pub use state::{RefreshSnapshot, RefreshState, RenderOutcome, ScreenPhase, Timing};
pub use supervisor::{DisplaySupervisor, SupervisorAction};

use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex as TokMutex};
use tokio::task::JoinHandle;

use crate::constants::COMMAND_QUEUE_DEPTH;
use crate::display::{Canvas, DisplayPanel};
use crate::touch::{shared, InteractionReport, TouchSampler, TouchSensor};
use actor::{EngineActor, Request};

/// Landscape canvas dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub width: u32,
    pub height: u32,
}

struct EngineTasks {
    sampler: JoinHandle<()>,
    supervisor: JoinHandle<()>,
    actor: JoinHandle<()>,
}

struct EngineInner {
    requests: mpsc::Sender<Request>,
    window: Window,
    shutdown_tx: watch::Sender<bool>,
    closing: AtomicBool,
    tasks: TokMutex<Option<EngineTasks>>,
    sampler_status: watch::Receiver<LoopStatus>,
    supervisor_status: watch::Receiver<LoopStatus>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        // Stop the loops; the actor releases the hardware once its queue closes
        if !self.closing.load(Ordering::Acquire) {
            debug!("Engine dropped without shutdown, stopping loops");
            self.shutdown_tx.send_replace(true);
        }
    }
}

/// Handle to the coordination engine.
///
/// Cheap to clone; every clone talks to the same actor. All commands are
/// queued and applied one at a time in submission order, so no hardware call
/// ever overlaps a mutation of the canvas, refresh or gesture state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Initialise the hardware and start the sampler, supervisor and actor
    /// tasks. Must be called from within a tokio runtime.
    pub async fn start<P, T>(panel: P, touch: T, timing: Timing) -> Result<Self, EngineError>
    where
        P: DisplayPanel + 'static,
        T: TouchSensor + 'static,
    {
        let touch = shared(touch);
        let (touch_tx, touch_rx) = watch::channel(false);
        let (sampler_status_tx, sampler_status) = watch::channel(LoopStatus::Starting);
        let (supervisor_status_tx, supervisor_status) = watch::channel(LoopStatus::Starting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (requests, request_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let (width, height) = panel.capabilities().landscape();
        let actor = EngineActor::start(
            Box::new(panel),
            Arc::clone(&touch),
            touch_rx,
            supervisor_status.clone(),
            timing.clone(),
        )?;

        let actor = tokio::spawn(actor.run(request_rx));
        let sampler = TouchSampler::new(touch, timing.touch_poll_period, touch_tx, sampler_status_tx)
            .spawn(shutdown_rx.clone());
        let supervisor = DisplaySupervisor::new(timing.supervisor_period, requests.clone(), supervisor_status_tx)
            .spawn(shutdown_rx);

        info!("Engine started, canvas {}x{}", width, height);

        Ok(Self {
            inner: Arc::new(EngineInner {
                requests,
                window: Window { width, height },
                shutdown_tx,
                closing: AtomicBool::new(false),
                tasks: TokMutex::new(Some(EngineTasks { sampler, supervisor, actor })),
                sampler_status,
                supervisor_status,
            }),
        })
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> Request,
    ) -> Result<T, EngineError> {
        if self.inner.closing.load(Ordering::Acquire) {
            return Err(EngineError::conflict("engine is shutting down"));
        }
        let (reply, response) = oneshot::channel();
        self.inner
            .requests
            .send(make(reply))
            .await
            .map_err(|_| EngineError::conflict("engine is not running"))?;
        response
            .await
            .map_err(|_| EngineError::conflict("engine stopped before replying"))?
    }

    /// Replace the canvas with a packed 1bpp landscape bitmap and queue a
    /// render. Resolves once the supervisor has pushed (or dropped) it.
    pub async fn render(&self, bitmap: Vec<u8>) -> Result<RenderOutcome, EngineError> {
        let canvas = Canvas::from_packed(self.inner.window.width, self.inner.window.height, bitmap)?;
        self.call(|reply| Request::Render { canvas: Some(canvas), full: false, reply }).await
    }

    /// As `render`, for a canvas drawn with embedded-graphics
    pub async fn render_canvas(&self, canvas: Canvas) -> Result<RenderOutcome, EngineError> {
        self.check_window(&canvas)?;
        self.call(|reply| Request::Render { canvas: Some(canvas), full: false, reply }).await
    }

    /// Queue a bitmap that is always pushed with a full refresh
    pub async fn render_frame(&self, bitmap: Vec<u8>) -> Result<RenderOutcome, EngineError> {
        let canvas = Canvas::from_packed(self.inner.window.width, self.inner.window.height, bitmap)?;
        self.call(|reply| Request::Render { canvas: Some(canvas), full: true, reply }).await
    }

    /// Queue a render of the current canvas
    pub async fn request_render(&self) -> Result<RenderOutcome, EngineError> {
        self.call(|reply| Request::Render { canvas: None, full: false, reply }).await
    }

    /// Scan the touch controller once and report touch/gesture state
    pub async fn detect_interaction(&self) -> Result<InteractionReport, EngineError> {
        self.call(|reply| Request::DetectInteraction { reply }).await
    }

    pub async fn sleep(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::Sleep { reply }).await
    }

    pub async fn awaken(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::Awaken { reply }).await
    }

    pub async fn clear_screen(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::ClearScreen { reply }).await
    }

    /// Blank the canvas; the panel is untouched until the next render
    pub async fn reset_canvas(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::ResetCanvas { reply }).await
    }

    /// Copy of the current canvas
    pub async fn canvas(&self) -> Result<Canvas, EngineError> {
        self.call(|reply| Request::Canvas { reply }).await
    }

    pub async fn status(&self) -> Result<RefreshSnapshot, EngineError> {
        self.call(|reply| Request::Status { reply }).await
    }

    pub fn get_window(&self) -> Window {
        self.inner.window
    }

    pub fn health(&self) -> EngineHealth {
        EngineHealth::new(
            self.inner.sampler_status.borrow().clone(),
            self.inner.supervisor_status.borrow().clone(),
            self.inner.closing.load(Ordering::Acquire),
        )
    }

    /// Stop both loops, put the panel to sleep and release the hardware.
    ///
    /// Returns after both loops have terminated. Later calls return `Ok(())`
    /// immediately.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let mut tasks = self.inner.tasks.lock().await;
        let Some(EngineTasks { sampler, supervisor, actor }) = tasks.take() else {
            debug!("Engine already shut down");
            return Ok(());
        };

        info!("Engine shutting down");
        self.inner.closing.store(true, Ordering::Release);
        self.inner.shutdown_tx.send_replace(true);

        if let Err(e) = sampler.await {
            error!("Touch sampler task failed: {}", e);
        }
        if let Err(e) = supervisor.await {
            error!("Display supervisor task failed: {}", e);
        }

        let (reply, response) = oneshot::channel();
        let result = match self.inner.requests.send(Request::Shutdown { reply }).await {
            Ok(()) => response
                .await
                .unwrap_or_else(|_| Err(EngineError::conflict("engine actor stopped during shutdown"))),
            Err(_) => Err(EngineError::conflict("engine actor already stopped")),
        };
        if let Err(e) = actor.await {
            error!("Engine actor task failed: {}", e);
        }

        info!("Engine shut down");
        result
    }

    fn check_window(&self, canvas: &Canvas) -> Result<(), EngineError> {
        let window = self.inner.window;
        if canvas.dimensions() != (window.width, window.height) {
            return Err(EngineError::InvalidInput(format!(
                "canvas is {}x{}, window is {}x{}",
                canvas.width(),
                canvas.height(),
                window.width,
                window.height
            )));
        }
        Ok(())
    }
}
