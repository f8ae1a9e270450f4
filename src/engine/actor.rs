/*
 *  engine/actor.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Single-writer owner of the canvas, refresh and gesture state
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

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::display::{BoxedPanel, Canvas, RefreshMode, WHITE_FILL};
use crate::engine::error::EngineError;
use crate::engine::health::LoopStatus;
use crate::engine::state::{RefreshSnapshot, RefreshState, RenderOutcome, Timing};
use crate::engine::supervisor::SupervisorAction;
use crate::touch::{lock_sensor, GestureDetector, InteractionReport, SharedTouchSensor};

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Messages handled by the engine actor, strictly in arrival order
pub(crate) enum Request {
    /// Replace the canvas (or keep it when `None`) and queue a render.
    /// The reply is held until the supervisor consumes the render.
    Render { canvas: Option<Canvas>, full: bool, reply: Reply<RenderOutcome> },
    DetectInteraction { reply: Reply<InteractionReport> },
    Sleep { reply: Reply<()> },
    Awaken { reply: Reply<()> },
    ClearScreen { reply: Reply<()> },
    ResetCanvas { reply: Reply<()> },
    Canvas { reply: Reply<Canvas> },
    Status { reply: Reply<RefreshSnapshot> },
    Tick { reply: Reply<Option<SupervisorAction>> },
    Shutdown { reply: Reply<()> },
}

pub(crate) struct EngineActor {
    panel: BoxedPanel,
    touch: SharedTouchSensor,
    touch_active: watch::Receiver<bool>,
    supervisor_status: watch::Receiver<LoopStatus>,
    timing: Timing,
    canvas: Canvas,
    refresh: RefreshState,
    gestures: GestureDetector,
    pending_renders: Vec<Reply<RenderOutcome>>,
    /// Set when a tick fails on hardware; the supervisor loop exits after it
    supervisor_fault: Option<EngineError>,
    released: bool,
}

impl EngineActor {
    /// Bring the hardware up: blank canvas pushed as the base image, touch
    /// controller initialised.
    pub(crate) fn start(
        mut panel: BoxedPanel,
        touch: SharedTouchSensor,
        touch_active: watch::Receiver<bool>,
        supervisor_status: watch::Receiver<LoopStatus>,
        timing: Timing,
    ) -> Result<Self, EngineError> {
        let now = Instant::now();
        let (width, height) = panel.capabilities().landscape();
        let canvas = Canvas::new(width, height);

        panel.init(RefreshMode::Full)?;
        let buffer = panel.get_buffer(&canvas)?;
        panel.display_full(&buffer)?;
        lock_sensor(&touch)?.initialize()?;
        info!("Panel {}x{} initialised, touch controller ready", width, height);

        Ok(Self {
            panel,
            touch,
            touch_active,
            supervisor_status,
            timing,
            canvas,
            refresh: RefreshState::new(now),
            gestures: GestureDetector::new(now),
            pending_renders: Vec::new(),
            supervisor_fault: None,
            released: false,
        })
    }

    pub(crate) async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        while let Some(request) = requests.recv().await {
            match request {
                Request::Render { canvas, full, reply } => self.queue_render(canvas, full, reply),
                Request::DetectInteraction { reply } => {
                    let _ = reply.send(self.detect_interaction());
                }
                Request::Sleep { reply } => {
                    let _ = reply.send(self.sleep().await);
                }
                Request::Awaken { reply } => {
                    let _ = reply.send(self.awaken());
                }
                Request::ClearScreen { reply } => {
                    let _ = reply.send(self.clear_screen());
                }
                Request::ResetCanvas { reply } => {
                    let (width, height) = self.canvas.dimensions();
                    self.canvas = Canvas::new(width, height);
                    debug!("Canvas reset");
                    let _ = reply.send(Ok(()));
                }
                Request::Canvas { reply } => {
                    let _ = reply.send(Ok(self.canvas.clone()));
                }
                Request::Status { reply } => {
                    let _ = reply.send(Ok(self.refresh.snapshot(Instant::now())));
                }
                Request::Tick { reply } => {
                    let _ = reply.send(self.tick().await);
                }
                Request::Shutdown { reply } => {
                    let _ = reply.send(self.shutdown().await);
                    return;
                }
            }
        }

        // every handle dropped without an explicit shutdown
        if !self.released {
            warn!("Engine dropped without shutdown, releasing hardware");
            if let Err(e) = self.release() {
                error!("Hardware release failed: {}", e);
            }
        }
    }

    fn queue_render(&mut self, canvas: Option<Canvas>, full: bool, reply: Reply<RenderOutcome>) {
        // nobody would ever consume the render
        if let Some(fault) = &self.supervisor_fault {
            let _ = reply.send(Err(EngineError::conflict(format!("display supervisor stopped: {}", fault))));
            return;
        }
        if !self.supervisor_status.borrow().is_live() {
            let _ = reply.send(Err(EngineError::conflict("display supervisor is not running")));
            return;
        }
        if let Some(canvas) = canvas {
            self.canvas = canvas;
        }
        self.refresh.request_render(full);
        self.pending_renders.push(reply);
    }

    async fn tick(&mut self) -> Result<Option<SupervisorAction>, EngineError> {
        let now = Instant::now();
        let Some(action) = SupervisorAction::decide(&self.refresh, now, &self.timing) else {
            return Ok(None);
        };

        match self.apply(action, now).await {
            Ok(()) => Ok(Some(action)),
            Err(e) => {
                if e.is_hardware_fault() {
                    // the loop stops on this reply; renders queued meanwhile must not wait on it
                    self.supervisor_fault = Some(e.clone());
                    self.refresh.should_render = false;
                    for waiter in self.pending_renders.drain(..) {
                        let _ = waiter.send(Err(e.clone()));
                    }
                }
                Err(e)
            }
        }
    }

    async fn apply(&mut self, action: SupervisorAction, now: Instant) -> Result<(), EngineError> {
        match action {
            SupervisorAction::Render => {
                let full = self.refresh.take_render();
                let outcome = self.render(full);
                for waiter in self.pending_renders.drain(..) {
                    let _ = waiter.send(outcome.clone());
                }
                outcome?;
            }
            SupervisorAction::Sleep => {
                info!(
                    "No touch for {:?}, putting screen to sleep",
                    now.saturating_duration_since(self.refresh.last_touched)
                );
                self.sleep().await?;
            }
            SupervisorAction::Awaken => {
                info!("Touch while asleep, waking screen");
                self.awaken()?;
            }
            SupervisorAction::ForcedRefresh => {
                info!(
                    "No full refresh for {:?}, forcing one",
                    now.saturating_duration_since(self.refresh.last_full_refresh)
                );
                self.forced_refresh().await?;
            }
        }
        Ok(())
    }

    /// Push the canvas. Partial updates until the ghosting budget is spent,
    /// then a full reinit which resets the budget.
    fn render(&mut self, full_requested: bool) -> Result<RenderOutcome, EngineError> {
        if !self.refresh.screen_active {
            warn!("Render dropped, screen is asleep");
            return Ok(RenderOutcome::Dropped);
        }

        let buffer = self.panel.get_buffer(&self.canvas)?;
        if full_requested
            || !self.panel.capabilities().supports_partial
            || self.refresh.partial_budget_spent(self.timing.max_partial_refreshes)
        {
            self.panel.init(RefreshMode::Full)?;
            self.panel.display_full(&buffer)?;
            self.refresh.record_full_refresh(Instant::now());
            debug!("Full refresh");
            Ok(RenderOutcome::Full)
        } else {
            self.panel.display_partial(&buffer)?;
            self.refresh.record_partial_refresh();
            debug!("Partial refresh {}", self.refresh.partial_refresh_counter);
            Ok(RenderOutcome::Partial)
        }
    }

    fn detect_interaction(&mut self) -> Result<InteractionReport, EngineError> {
        let touch_active = *self.touch_active.borrow();
        let event = {
            let mut sensor = lock_sensor(&self.touch)?;
            self.gestures.detect(&mut **sensor, touch_active, Instant::now())?
        };
        self.refresh.last_touched = self.gestures.state().last_touched;
        Ok(self.gestures.report(event))
    }

    /// White full clear, then the settle delay, then deep sleep
    async fn sleep(&mut self) -> Result<(), EngineError> {
        self.clear_screen()?;
        self.refresh.screen_active = false;
        tokio::time::sleep(self.timing.sleep_settle).await;
        self.panel.sleep()?;
        info!("Screen asleep");
        Ok(())
    }

    /// Partial-mode init and the canvas redrawn as base image
    fn awaken(&mut self) -> Result<(), EngineError> {
        self.panel.init(RefreshMode::Partial)?;
        let buffer = self.panel.get_buffer(&self.canvas)?;
        self.panel.display_full(&buffer)?;
        self.refresh.screen_active = true;
        info!("Screen awake");
        Ok(())
    }

    fn clear_screen(&mut self) -> Result<(), EngineError> {
        self.panel.init(RefreshMode::Full)?;
        self.panel.clear(WHITE_FILL)?;
        self.refresh.record_full_refresh(Instant::now());
        Ok(())
    }

    /// Clear, then restore whatever the screen should show. A sleeping panel
    /// gets the same settle delay as `sleep` before going back down.
    async fn forced_refresh(&mut self) -> Result<(), EngineError> {
        self.clear_screen()?;
        if self.refresh.screen_active {
            let buffer = self.panel.get_buffer(&self.canvas)?;
            self.panel.display_full(&buffer)?;
        } else {
            tokio::time::sleep(self.timing.sleep_settle).await;
            self.panel.sleep()?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), EngineError> {
        for waiter in self.pending_renders.drain(..) {
            let _ = waiter.send(Err(EngineError::conflict("engine shut down before the render was pushed")));
        }
        self.refresh.should_render = false;

        let slept = self.sleep().await;
        if let Err(e) = &slept {
            error!("Sleep during shutdown failed: {}", e);
        }
        let released = self.release();
        if released.is_ok() {
            info!("Engine hardware released");
        }
        slept.and(released)
    }

    fn release(&mut self) -> Result<(), EngineError> {
        self.released = true;
        let panel = self.panel.release().map_err(EngineError::from);
        let touch = lock_sensor(&self.touch)
            .map_err(EngineError::from)
            .and_then(|mut sensor| sensor.release().map_err(EngineError::from));
        panel.and(touch)
    }
}
