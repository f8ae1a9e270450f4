/*
 *  display/canvas.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared 1-bit landscape canvas and panel buffer packing
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

use embedded_graphics::prelude::*;
use embedded_graphics::pixelcolor::BinaryColor;
use thiserror::Error;

use crate::display::error::DisplayError;

/// Fill byte for an all-white row segment (set bits are paper, cleared bits are ink)
pub const WHITE_FILL: u8 = 0xFF;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("bitmap is {actual} bytes, a {width}x{height} canvas needs {expected}")]
    SizeMismatch { width: u32, height: u32, expected: usize, actual: usize },
    #[error("canvas dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
}

/// Monochrome bitmap in landscape orientation.
///
/// Pixels are packed 8 per byte, most significant bit first, each row padded
/// to a whole byte. A set bit is white paper, a cleared bit is black ink, which
/// matches the packed 1bpp format render producers submit.
///
/// For embedded-graphics drawing `BinaryColor::On` is ink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Canvas {
    /// Blank (all white) canvas
    pub fn new(width: u32, height: u32) -> Self {
        let stride = Self::stride_for(width);
        Self {
            width,
            height,
            stride,
            data: vec![WHITE_FILL; stride * height as usize],
        }
    }

    /// Wrap a packed bitmap, checking it covers exactly `width`x`height`
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::EmptyDimensions { width, height });
        }
        let expected = Self::packed_len(width, height);
        if data.len() != expected {
            return Err(CanvasError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride: Self::stride_for(width),
            data,
        })
    }

    /// Number of bytes a packed bitmap of this size occupies
    pub fn packed_len(width: u32, height: u32) -> usize {
        Self::stride_for(width) * height as usize
    }

    fn stride_for(width: u32) -> usize {
        (width as usize).div_ceil(8)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw packed rows
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// `Some(true)` when the pixel carries ink, `None` outside the canvas
    pub fn is_ink(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let (idx, mask) = self.locate(x, y);
        Some(self.data[idx] & mask == 0)
    }

    /// Set or clear ink at a pixel; coordinates outside the canvas are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, ink: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (idx, mask) = self.locate(x, y);
        if ink {
            self.data[idx] &= !mask;
        } else {
            self.data[idx] |= mask;
        }
    }

    /// Count inked pixels, ignoring row padding
    pub fn count_ink_pixels(&self) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_ink(x, y) == Some(true))
            .count()
    }

    #[inline]
    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let idx = y as usize * self.stride + (x as usize / 8);
        (idx, 0x80 >> (x % 8))
    }

    /// Repack for a panel whose native geometry is `native_width`x`native_height`.
    ///
    /// A canvas in the panel's own orientation is copied as is. A landscape
    /// canvas (dimensions swapped) is rotated into the native portrait layout,
    /// canvas column x landing on native row `native_height - x - 1`.
    pub fn pack_for_panel(&self, native_width: u32, native_height: u32) -> Result<Vec<u8>, DisplayError> {
        if self.width == native_width && self.height == native_height {
            return Ok(self.data.clone());
        }

        if self.width != native_height || self.height != native_width {
            return Err(DisplayError::BufferSizeMismatch {
                expected: Self::packed_len(native_width, native_height),
                actual: self.data.len(),
            });
        }

        let line_width = Self::stride_for(native_width);
        let mut buffer = vec![WHITE_FILL; line_width * native_height as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_ink(x, y) == Some(true) {
                    let new_x = y as usize;
                    let new_y = (native_height - x - 1) as usize;
                    buffer[new_x / 8 + new_y * line_width] &= !(0x80 >> (new_x % 8));
                }
            }
        }
        Ok(buffer)
    }

    /// Binary PBM (P4) image of the canvas, for visual debugging
    pub fn to_pbm(&self) -> Vec<u8> {
        let mut out = format!("P4\n{} {}\n", self.width, self.height).into_bytes();
        // PBM uses 1 for black, the inverse of the canvas convention
        out.extend(self.data.iter().map(|b| !b));
        out
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = if color.is_on() { 0x00 } else { WHITE_FILL };
        self.data.fill(fill);
        Ok(())
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
