/*
 *  display/drivers/mock.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock e-paper panel for testing and running without hardware
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

use crate::display::error::DisplayError;
use crate::display::traits::{DisplayPanel, PanelCapabilities, RefreshMode};

use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

/// Native geometry of the 2.13" V4 touch panel
pub const EPD_2IN13_WIDTH: u32 = 122;
pub const EPD_2IN13_HEIGHT: u32 = 250;

/// One recorded panel call, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOp {
    Init(RefreshMode),
    DisplayFull,
    DisplayPartial,
    Clear(u8),
    Sleep,
    Release,
}

/// Mock panel driver
///
/// This driver simulates an e-paper panel without requiring hardware. It's
/// useful for:
/// - Unit tests
/// - Integration tests
/// - Development without hardware
///
/// Every call is recorded in a shared state that tests can inspect while the
/// panel itself is owned by the engine. Frames can optionally be written out
/// as PBM snapshots.
#[derive(Debug, Clone)]
pub struct MockPanel {
    capabilities: PanelCapabilities,
    state: Arc<Mutex<MockPanelState>>,
    snapshot_dir: Option<PathBuf>,
}

/// Internal state for the mock panel (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockPanelState {
    /// Every call in order
    pub ops: Vec<PanelOp>,

    /// Same calls with the time each one happened
    pub timeline: Vec<(PanelOp, Instant)>,

    /// Mode loaded by the last init()
    pub mode: Option<RefreshMode>,

    /// Last buffer pushed through either display path
    pub last_buffer: Option<Vec<u8>>,

    /// Counters per display path
    pub full_count: usize,
    pub partial_count: usize,
    pub clear_count: usize,

    /// Set by sleep(), cleared by init()
    pub asleep: bool,

    /// Set by release()
    pub released: bool,

    /// Simulate failures (for error testing)
    pub simulate_init_failure: bool,
    pub simulate_display_failure: bool,
    pub simulate_clear_failure: bool,
    pub simulate_sleep_failure: bool,
}

impl MockPanelState {
    fn record(&mut self, op: PanelOp) {
        self.ops.push(op);
        self.timeline.push((op, Instant::now()));
    }

    /// Time between each `Clear` and the `Sleep` that follows it
    pub fn clear_to_sleep_gaps(&self) -> Vec<std::time::Duration> {
        let mut gaps = Vec::new();
        let mut cleared_at = None;
        for (op, at) in &self.timeline {
            match op {
                PanelOp::Clear(_) => cleared_at = Some(*at),
                PanelOp::Sleep => {
                    if let Some(cleared) = cleared_at.take() {
                        gaps.push(at.saturating_duration_since(cleared));
                    }
                }
                _ => {}
            }
        }
        gaps
    }

    /// Number of init() calls for one mode
    pub fn init_count(&self, mode: RefreshMode) -> usize {
        self.ops.iter().filter(|op| **op == PanelOp::Init(mode)).count()
    }
}

impl MockPanel {
    /// Create a mock panel with the 2.13" geometry
    pub fn new() -> Self {
        Self::new_with_size(EPD_2IN13_WIDTH, EPD_2IN13_HEIGHT)
    }

    /// Create a mock panel with specific native dimensions
    pub fn new_with_size(width: u32, height: u32) -> Self {
        Self {
            capabilities: PanelCapabilities {
                width,
                height,
                supports_partial: true,
            },
            state: Arc::new(Mutex::new(MockPanelState::default())),
            snapshot_dir: None,
        }
    }

    /// Controller without a partial-update waveform
    pub fn full_only(mut self) -> Self {
        self.capabilities.supports_partial = false;
        self
    }

    /// Write every pushed frame as `frame-NNNNN.pbm` into `dir`
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockPanelState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockPanelState>, DisplayError> {
        self.state
            .lock()
            .map_err(|_| DisplayError::Other("mock panel state poisoned".to_string()))
    }

    fn expected_len(&self) -> usize {
        (self.capabilities.width as usize).div_ceil(8) * self.capabilities.height as usize
    }

    fn push(&mut self, buffer: &[u8], full: bool) -> Result<(), DisplayError> {
        let expected = self.expected_len();
        if buffer.len() != expected {
            return Err(DisplayError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        let frame = {
            let mut state = self.lock()?;
            if state.released {
                return Err(DisplayError::Released);
            }
            if state.simulate_display_failure {
                return Err(DisplayError::SpiError("Simulated display failure".to_string()));
            }
            if full {
                state.record(PanelOp::DisplayFull);
                state.full_count += 1;
            } else {
                state.record(PanelOp::DisplayPartial);
                state.partial_count += 1;
            }
            state.last_buffer = Some(buffer.to_vec());
            state.full_count + state.partial_count
        }; // Release lock before touching the filesystem

        self.save_snapshot(frame, buffer);
        Ok(())
    }

    fn save_snapshot(&self, frame: usize, buffer: &[u8]) {
        let Some(dir) = self.snapshot_dir.as_ref() else {
            return;
        };
        let path = dir.join(format!("frame-{:05}.pbm", frame));
        let mut pbm = format!("P4\n{} {}\n", self.capabilities.width, self.capabilities.height)
            .into_bytes();
        pbm.extend(buffer.iter().map(|b| !b));
        match std::fs::write(&path, pbm) {
            Ok(()) => debug!("Saved panel snapshot {}", path.display()),
            Err(e) => log::warn!("Failed to save panel snapshot {}: {}", path.display(), e),
        }
    }
}

impl Default for MockPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayPanel for MockPanel {
    fn capabilities(&self) -> &PanelCapabilities {
        &self.capabilities
    }

    fn init(&mut self, mode: RefreshMode) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        if state.released {
            return Err(DisplayError::Released);
        }
        if state.simulate_init_failure {
            return Err(DisplayError::InitializationFailed("Simulated init failure".to_string()));
        }
        state.record(PanelOp::Init(mode));
        state.mode = Some(mode);
        state.asleep = false;
        Ok(())
    }

    fn display_full(&mut self, buffer: &[u8]) -> Result<(), DisplayError> {
        self.push(buffer, true)
    }

    fn display_partial(&mut self, buffer: &[u8]) -> Result<(), DisplayError> {
        self.push(buffer, false)
    }

    fn clear(&mut self, fill: u8) -> Result<(), DisplayError> {
        let len = self.expected_len();
        let mut state = self.lock()?;
        if state.released {
            return Err(DisplayError::Released);
        }
        if state.simulate_clear_failure {
            return Err(DisplayError::Busy("Simulated clear failure".to_string()));
        }
        state.record(PanelOp::Clear(fill));
        state.clear_count += 1;
        state.last_buffer = Some(vec![fill; len]);
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        if state.released {
            return Err(DisplayError::Released);
        }
        if state.simulate_sleep_failure {
            return Err(DisplayError::GpioError("Simulated sleep failure".to_string()));
        }
        state.record(PanelOp::Sleep);
        state.asleep = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        state.record(PanelOp::Release);
        state.released = true;
        Ok(())
    }
}
