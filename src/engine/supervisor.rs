/*
 *  engine/supervisor.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display supervisor - refresh/sleep/wake decisions and the tick loop
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
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::actor::Request;
use crate::engine::error::EngineError;
use crate::engine::health::LoopStatus;
use crate::engine::state::{RefreshState, Timing};

/// The single action a supervisor tick performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupervisorAction {
    Render,
    Sleep,
    Awaken,
    ForcedRefresh,
}

impl SupervisorAction {
    /// First matching rule wins:
    /// pending render, inactivity sleep, wake on recent touch, then the
    /// periodic forced full refresh.
    pub fn decide(state: &RefreshState, now: Instant, timing: &Timing) -> Option<Self> {
        let idle = now.saturating_duration_since(state.last_touched);

        if state.should_render {
            Some(SupervisorAction::Render)
        } else if state.screen_active && idle > timing.timeout_interval {
            Some(SupervisorAction::Sleep)
        } else if !state.screen_active && idle < timing.timeout_interval {
            Some(SupervisorAction::Awaken)
        } else if now.saturating_duration_since(state.last_full_refresh) > timing.max_refresh_interval {
            Some(SupervisorAction::ForcedRefresh)
        } else {
            None
        }
    }
}

/// Drives the engine's state machine once per period.
///
/// Each tick is a request to the engine actor and the loop waits for its
/// reply, so a slow panel operation stretches the tick spacing rather than
/// queueing ticks behind it.
pub struct DisplaySupervisor {
    period: Duration,
    requests: mpsc::Sender<Request>,
    status: watch::Sender<LoopStatus>,
}

impl DisplaySupervisor {
    pub(crate) fn new(period: Duration, requests: mpsc::Sender<Request>, status: watch::Sender<LoopStatus>) -> Self {
        Self { period, requests, status }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.status.send_replace(LoopStatus::Running);
        info!("Display supervisor running every {:?}", self.period);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("Display supervisor received stop signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(Some(action)) => debug!("Supervisor tick: {:?}", action),
                        Ok(None) => {}
                        Err(e) if e.is_hardware_fault() => {
                            error!("Display supervisor stopped on hardware fault: {}", e);
                            self.status.send_replace(LoopStatus::Faulted(e.to_string()));
                            return;
                        }
                        Err(e) => {
                            debug!("Display supervisor exiting: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        self.status.send_replace(LoopStatus::Stopped);
        info!("Display supervisor stopped");
    }

    async fn tick(&self) -> Result<Option<SupervisorAction>, EngineError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Tick { reply })
            .await
            .map_err(|_| EngineError::conflict("engine actor has stopped"))?;
        response
            .await
            .map_err(|_| EngineError::conflict("engine actor dropped the tick"))?
    }
}
