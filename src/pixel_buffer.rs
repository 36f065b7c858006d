use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// Interleaved R,G,B; the only layout this crate handles.
pub const COMPONENTS: usize = 3;

/// Perceptual luminance of an RGB triple, truncated to a byte.
///
/// Integer weights give the exact truncation of `0.30r + 0.59g + 0.11b`,
/// so a uniform `(m, m, m)` pixel always maps to `m`. Evaluating the same sum
/// in `f64` and truncating lands one lower for some triples where the exact
/// sum is a whole number, so results can differ by 1 from a float implementation.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 30 * u32::from(r) + 59 * u32::from(g) + 11 * u32::from(b);
    (weighted / 100).min(255) as u8
}

/// Owned row-major RGB8 image plus the darkest luminance seen while it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    min_luminance: u8,
}

impl PixelBuffer {
    /// Build a buffer from top-to-bottom scanlines.
    ///
    /// Each scanline must hold exactly `width * components` bytes. Scanlines
    /// past `height` are ignored; fewer than `height` is an error, as is any
    /// component count other than 3.
    pub fn from_scanlines<'a, I>(width: u32, height: u32, components: usize, scanlines: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        if components != COMPONENTS {
            return Err(Error::decode(format!(
                "unsupported component count {} (expected {})",
                components, COMPONENTS
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::decode(format!("empty image {}x{}", width, height)));
        }

        let stride = width as usize * COMPONENTS;
        let len = stride
            .checked_mul(height as usize)
            .ok_or_else(|| Error::decode(format!("image too large: {}x{}", width, height)))?;

        let mut pixels = Vec::with_capacity(len);
        let mut min_luminance = u8::MAX;
        let mut rows = 0u32;

        for line in scanlines.into_iter().take(height as usize) {
            if line.len() != stride {
                return Err(Error::decode(format!(
                    "scanline {} has {} bytes, expected {}",
                    rows,
                    line.len(),
                    stride
                )));
            }
            for px in line.chunks_exact(COMPONENTS) {
                min_luminance = min_luminance.min(luminance(px[0], px[1], px[2]));
            }
            pixels.extend_from_slice(line);
            rows += 1;
        }

        if rows < height {
            return Err(Error::decode(format!(
                "truncated image: got {} of {} scanlines",
                rows, height
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
            min_luminance,
        })
    }

    /// Uniformly filled buffer.
    #[cfg(test)]
    pub fn from_pixel(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let row = rgb.repeat(width as usize);
        let rows = std::iter::repeat(row.as_slice()).take(height as usize);
        Self::from_scanlines(width, height, COMPONENTS, rows).expect("valid test buffer")
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

    /// Darkest luminance at construction time. Compositing onto this buffer does not update it.
    pub fn min_luminance(&self) -> u8 {
        self.min_luminance
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte offset of pixel `(x, y)`, or `None` when outside the image.
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * COMPONENTS)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let at = self.offset(x, y)?;
        self.pixels.get(at..at + COMPONENTS)
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let at = self.offset(x, y)?;
        self.pixels.get_mut(at..at + COMPONENTS)
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            components: COMPONENTS,
            color_space: "RGB",
            min_luminance: self.min_luminance,
        }
    }
}

/// Summary printed for each decoded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub components: usize,
    pub color_space: &'static str,
    pub min_luminance: u8,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Geometry: {}x{} pixels", self.width, self.height)?;
        writeln!(f, "BPP: {}", self.components)?;
        writeln!(f, "Color space: {}", self.color_space)?;
        write!(f, "Min luminance: {}", self.min_luminance)
    }
}
