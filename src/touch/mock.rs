/*
 *  touch/mock.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Scripted touch controller for testing without hardware
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

use crate::touch::traits::{PinLevel, TouchError, TouchScan, TouchSensor};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock touch controller
///
/// Scans are served from a script queue; once it runs dry every scan reports
/// no contact. The interrupt line level is set directly through the shared
/// state.
#[derive(Debug, Clone, Default)]
pub struct MockTouch {
    state: Arc<Mutex<MockTouchState>>,
}

/// Internal state for the mock controller (shared for inspection in tests)
#[derive(Debug)]
pub struct MockTouchState {
    /// Level returned by read_interrupt_pin()
    pub interrupt_level: PinLevel,

    /// Scans served in order by scan()
    pub script: VecDeque<TouchScan>,

    pub initialized: bool,
    pub released: bool,

    /// Call counters
    pub pin_reads: usize,
    pub scans: usize,

    /// Sampler flag passed to the last scan()
    pub last_touch_active: Option<bool>,

    /// Simulate failures (for error testing)
    pub simulate_pin_failure: bool,
    pub simulate_scan_failure: bool,
}

impl Default for MockTouchState {
    fn default() -> Self {
        Self {
            interrupt_level: PinLevel::High,
            script: VecDeque::new(),
            initialized: false,
            released: false,
            pin_reads: 0,
            scans: 0,
            last_touch_active: None,
            simulate_pin_failure: false,
            simulate_scan_failure: false,
        }
    }
}

impl MockTouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockTouchState>> {
        Arc::clone(&self.state)
    }

    /// Append scans to the script
    pub fn push_scans(&self, scans: impl IntoIterator<Item = TouchScan>) {
        if let Ok(mut state) = self.state.lock() {
            state.script.extend(scans);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockTouchState>, TouchError> {
        self.state
            .lock()
            .map_err(|_| TouchError::Other("mock touch state poisoned".to_string()))
    }
}

impl TouchSensor for MockTouch {
    fn initialize(&mut self) -> Result<(), TouchError> {
        let mut state = self.lock()?;
        state.initialized = true;
        Ok(())
    }

    fn read_interrupt_pin(&mut self) -> Result<PinLevel, TouchError> {
        let mut state = self.lock()?;
        if state.released {
            return Err(TouchError::Released);
        }
        if state.simulate_pin_failure {
            return Err(TouchError::GpioError("Simulated interrupt read failure".to_string()));
        }
        state.pin_reads += 1;
        Ok(state.interrupt_level)
    }

    fn scan(&mut self, touch_active: bool, _previous: &TouchScan) -> Result<TouchScan, TouchError> {
        let mut state = self.lock()?;
        if state.released {
            return Err(TouchError::Released);
        }
        if state.simulate_scan_failure {
            return Err(TouchError::I2cError("Simulated scan failure".to_string()));
        }
        state.scans += 1;
        state.last_touch_active = Some(touch_active);
        Ok(state.script.pop_front().unwrap_or_default())
    }

    fn release(&mut self) -> Result<(), TouchError> {
        let mut state = self.lock()?;
        state.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_released() {
        let mut touch = MockTouch::new();
        touch.push_scans([TouchScan::single(100, 50)]);

        let first = touch.scan(true, &TouchScan::released()).unwrap();
        assert_eq!(first.count(), 1);
        let second = touch.scan(false, &first).unwrap();
        assert_eq!(second.count(), 0);
        assert_eq!(touch.state().lock().unwrap().last_touch_active, Some(false));
    }

    #[test]
    fn test_interrupt_level() {
        let mut touch = MockTouch::new();
        assert_eq!(touch.read_interrupt_pin().unwrap(), PinLevel::High);
        touch.state().lock().unwrap().interrupt_level = PinLevel::Low;
        assert!(touch.read_interrupt_pin().unwrap().touch_pending());
        assert_eq!(touch.state().lock().unwrap().pin_reads, 2);
    }
}
