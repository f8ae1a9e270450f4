/*
 *  touch/traits.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Touch controller abstraction and raw sample types
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

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Error type for touch controller operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TouchError {
    #[error("Touch controller initialization failed: {0}")]
    InitializationFailed(String),
    #[error("I2C communication error: {0}")]
    I2cError(String),
    #[error("GPIO error: {0}")]
    GpioError(String),
    #[error("Touch controller has been released")]
    Released,
    #[error("{0}")]
    Other(String),
}

/// Level of the touch controller's interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    /// The interrupt is active low: the chip pulls the line down when it has data
    pub fn touch_pending(self) -> bool {
        self == PinLevel::Low
    }
}

/// A touch coordinate in panel space
///
/// The panel is mounted rotated, so `y` grows as a finger moves left and `x`
/// grows as it moves down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

impl TouchPoint {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Result of one controller scan: the active touch points, in report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchScan {
    pub points: Vec<TouchPoint>,
}

impl TouchScan {
    /// Scan with no contact
    pub fn released() -> Self {
        Self::default()
    }

    /// Scan with a single contact
    pub fn single(x: u16, y: u16) -> Self {
        Self { points: vec![TouchPoint::new(x, y)] }
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> Option<TouchPoint> {
        self.points.first().copied()
    }
}

/// Capacitive touch controller hardware abstraction
///
/// Register-level I2C access lives behind this trait.
pub trait TouchSensor: Send {
    /// Reset and configure the controller
    fn initialize(&mut self) -> Result<(), TouchError>;

    /// Sample the interrupt line once
    fn read_interrupt_pin(&mut self) -> Result<PinLevel, TouchError>;

    /// Read the current touch points.
    ///
    /// `touch_active` is the debounced interrupt flag from the sampler and
    /// `previous` the last scan; controllers that only refresh their point
    /// registers on an interrupt may return `previous` unchanged.
    fn scan(&mut self, touch_active: bool, previous: &TouchScan) -> Result<TouchScan, TouchError>;

    /// Release the bus and GPIO lines
    fn release(&mut self) -> Result<(), TouchError> {
        Ok(())
    }
}

pub type BoxedTouchSensor = Box<dyn TouchSensor>;

/// Touch sensor shared by the sampler (interrupt line) and the engine (scans).
/// The lock is held for one hardware call at a time.
pub type SharedTouchSensor = Arc<Mutex<BoxedTouchSensor>>;

pub fn shared(sensor: impl TouchSensor + 'static) -> SharedTouchSensor {
    Arc::new(Mutex::new(Box::new(sensor)))
}

pub fn lock_sensor(sensor: &SharedTouchSensor) -> Result<MutexGuard<'_, BoxedTouchSensor>, TouchError> {
    sensor
        .lock()
        .map_err(|_| TouchError::Other("touch sensor lock poisoned".to_string()))
}
