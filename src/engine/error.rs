/*
 *  engine/error.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error taxonomy for engine commands
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

use thiserror::Error;

use crate::display::{CanvasError, DisplayError};
use crate::touch::TouchError;

/// Panel or touch I/O failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareFault {
    #[error("panel: {0}")]
    Panel(#[from] DisplayError),
    #[error("touch: {0}")]
    Touch(#[from] TouchError),
}

/// Error returned by every engine command.
///
/// Failures are never retried; the engine keeps its last known good state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("hardware fault: {0}")]
    HardwareFault(#[from] HardwareFault),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("state conflict: {0}")]
    StateConflict(String),
}

impl EngineError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::StateConflict(msg.into())
    }

    pub fn is_hardware_fault(&self) -> bool {
        matches!(self, EngineError::HardwareFault(_))
    }
}

impl From<DisplayError> for EngineError {
    fn from(err: DisplayError) -> Self {
        EngineError::HardwareFault(HardwareFault::Panel(err))
    }
}

impl From<TouchError> for EngineError {
    fn from(err: TouchError) -> Self {
        EngineError::HardwareFault(HardwareFault::Touch(err))
    }
}

impl From<CanvasError> for EngineError {
    fn from(err: CanvasError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}
