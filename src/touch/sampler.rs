/*
 *  touch/sampler.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Background interrupt-line sampler
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

use log::{debug, error, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::health::LoopStatus;
use crate::touch::traits::{lock_sensor, SharedTouchSensor, TouchError};

/// Polls the touch interrupt line at a fixed period and publishes a
/// "touch active" flag for the gesture detector.
pub struct TouchSampler {
    sensor: SharedTouchSensor,
    period: Duration,
    touch_tx: watch::Sender<bool>,
    status: watch::Sender<LoopStatus>,
}

impl TouchSampler {
    pub fn new(
        sensor: SharedTouchSensor,
        period: Duration,
        touch_tx: watch::Sender<bool>,
        status: watch::Sender<LoopStatus>,
    ) -> Self {
        Self { sensor, period, touch_tx, status }
    }

    /// Run on the tokio runtime until `shutdown` flips to true
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.status.send_replace(LoopStatus::Running);
        info!("Touch sampler running every {:?}", self.period);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("Touch sampler received stop signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sample() {
                        error!("Touch sampler stopped on interrupt read failure: {}", e);
                        self.status.send_replace(LoopStatus::Faulted(e.to_string()));
                        return;
                    }
                }
            }
        }

        self.status.send_replace(LoopStatus::Stopped);
        info!("Touch sampler stopped");
    }

    fn sample(&self) -> Result<(), TouchError> {
        let level = lock_sensor(&self.sensor)?.read_interrupt_pin()?;
        let active = level.touch_pending();
        self.touch_tx.send_if_modified(|current| {
            if *current != active {
                *current = active;
                true
            } else {
                false
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::mock::MockTouch;
    use crate::touch::traits::{shared, PinLevel};

    #[tokio::test(start_paused = true)]
    async fn test_sampler_tracks_interrupt_line() {
        let touch = MockTouch::new();
        let touch_state = touch.state();
        let (touch_tx, touch_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(LoopStatus::Starting);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = TouchSampler::new(shared(touch), Duration::from_millis(20), touch_tx, status_tx)
            .spawn(stop_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!*touch_rx.borrow());
        assert_eq!(*status_rx.borrow(), LoopStatus::Running);

        touch_state.lock().unwrap().interrupt_level = PinLevel::Low;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(*touch_rx.borrow());

        stop_tx.send_replace(true);
        handle.await.unwrap();
        assert_eq!(*status_rx.borrow(), LoopStatus::Stopped);

        // no reads after the loop has been joined
        let reads = touch_state.lock().unwrap().pin_reads;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(touch_state.lock().unwrap().pin_reads, reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_fault_is_terminal() {
        let touch = MockTouch::new();
        touch.state().lock().unwrap().simulate_pin_failure = true;
        let (touch_tx, _touch_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(LoopStatus::Starting);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let handle = TouchSampler::new(shared(touch), Duration::from_millis(20), touch_tx, status_tx)
            .spawn(stop_rx);
        handle.await.unwrap();

        assert!(matches!(*status_rx.borrow(), LoopStatus::Faulted(_)));
    }
}
