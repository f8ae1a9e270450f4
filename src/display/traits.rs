/*
 *  display/traits.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for e-paper panel abstraction
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

use crate::display::canvas::Canvas;
use crate::display::error::DisplayError;

/// Panel update waveform selected at init time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Slow full redraw, clears ghosting
    Full,

    /// Fast update of changed pixels only, accumulates ghosting
    Partial,
}

/// Panel capabilities and metadata
#[derive(Debug, Clone)]
pub struct PanelCapabilities {
    /// Native width in pixels (short edge on the 2.13" panel)
    pub width: u32,

    /// Native height in pixels
    pub height: u32,

    /// Whether the controller has a partial-update waveform
    pub supports_partial: bool,
}

impl PanelCapabilities {
    /// Canvas dimensions for landscape use: the native axes swapped
    pub fn landscape(&self) -> (u32, u32) {
        (self.height, self.width)
    }
}

/// Minimal e-paper hardware abstraction
///
/// Register-level SPI/GPIO work lives behind this trait. The supervisor only
/// ever sequences these calls; it never talks to the bus itself.
pub trait DisplayPanel: Send {
    /// Returns the capabilities of this panel
    fn capabilities(&self) -> &PanelCapabilities;

    /// Returns the native dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Reset the controller and load the waveform for `mode`
    fn init(&mut self, mode: RefreshMode) -> Result<(), DisplayError>;

    /// Convert a canvas into the panel's native buffer layout
    fn get_buffer(&self, canvas: &Canvas) -> Result<Vec<u8>, DisplayError> {
        let (width, height) = self.dimensions();
        canvas.pack_for_panel(width, height)
    }

    /// Push a whole buffer as the new base image (full refresh)
    fn display_full(&mut self, buffer: &[u8]) -> Result<(), DisplayError>;

    /// Push a buffer through the partial-update path
    fn display_partial(&mut self, buffer: &[u8]) -> Result<(), DisplayError>;

    /// Fill the panel with a constant byte (0xFF is white)
    ///
    /// This is a physical multi-second operation on real glass.
    fn clear(&mut self, fill: u8) -> Result<(), DisplayError>;

    /// Enter deep sleep
    fn sleep(&mut self) -> Result<(), DisplayError>;

    /// Release the bus and GPIO lines; no call is valid afterwards
    fn release(&mut self) -> Result<(), DisplayError>;
}

pub type BoxedPanel = Box<dyn DisplayPanel>;
