/*
 *  display/mod.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - panel abstraction and the shared canvas
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod canvas;

// Panel drivers
pub mod drivers;

// Re-exports for convenience
pub use traits::{DisplayPanel, BoxedPanel, PanelCapabilities, RefreshMode};
pub use error::DisplayError;
pub use canvas::{Canvas, CanvasError, WHITE_FILL};
pub use drivers::mock::{MockPanel, MockPanelState, PanelOp};
