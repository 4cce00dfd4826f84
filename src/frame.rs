//! Captured frames.
//!
//! - `Frame`: an owned H×W×3 image with 8-bit channels and a declared color order.
//! - `ColorOrder`: channel order of the packed pixel bytes.
//!
//! Sources hand frames to the pipeline by value; the pipeline keeps each frame only for the
//! duration of one tick, or hands it to the event sink when an event fires.

use anyhow::{anyhow, Result};
use image::RgbImage;

pub const CHANNELS: usize = 3;

/// Channel order of a packed 3-channel frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr,
}

/// Owned interleaved 8-bit frame.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ColorOrder,
}

impl Frame {
    /// Wrap packed pixel bytes. Dimensions must be non-zero and match the buffer length.
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: ColorOrder) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero, got {width}x{height}"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} bytes for a {}x{} frame, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    /// A frame filled with a single color, given in RGB.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixels = (width as usize) * (height as usize);
        let data = rgb.repeat(pixels);
        Self::new(data, width, height, ColorOrder::Rgb)
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            order: ColorOrder::Rgb,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGB copy of this frame, swapping channels when the frame is BGR.
    pub fn to_rgb_image(&self) -> RgbImage {
        let data = match self.order {
            ColorOrder::Rgb => self.data.clone(),
            ColorOrder::Bgr => self
                .data
                .chunks_exact(CHANNELS)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        };
        // Length is checked in `new`, so the buffer always fits.
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}
