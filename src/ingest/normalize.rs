//! Conversion of raw capture buffers into `Frame`s.

use anyhow::{anyhow, Context, Result};
use image::ImageFormat;

use crate::frame::{ColorOrder, Frame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
    /// Planar Y followed by interleaved UV at quarter resolution.
    Nv12,
    Mjpeg,
}

impl PixelFormat {
    /// Map a V4L2 fourcc to a supported format.
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"RGB3" => Some(Self::Rgb24),
            b"BGR3" => Some(Self::Bgr24),
            b"YUYV" => Some(Self::Yuyv),
            b"NV12" => Some(Self::Nv12),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

/// Build a frame from a capture buffer. Packed RGB/BGR keep their channel order; YUV formats
/// are converted to RGB and MJPEG is decoded.
pub fn normalize_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame> {
    match format {
        PixelFormat::Rgb24 => packed(pixels, width, height, ColorOrder::Rgb),
        PixelFormat::Bgr24 => packed(pixels, width, height, ColorOrder::Bgr),
        PixelFormat::Yuyv => {
            let rgb = yuyv_to_rgb(pixels, width, height)?;
            Frame::new(rgb, width, height, ColorOrder::Rgb)
        }
        PixelFormat::Nv12 => {
            let rgb = nv12_to_rgb(pixels, width, height)?;
            Frame::new(rgb, width, height, ColorOrder::Rgb)
        }
        PixelFormat::Mjpeg => {
            let image = image::load_from_memory_with_format(pixels, ImageFormat::Jpeg)
                .context("decode MJPEG frame")?;
            Ok(Frame::from_rgb_image(image.to_rgb8()))
        }
    }
}

fn packed(pixels: &[u8], width: u32, height: u32, order: ColorOrder) -> Result<Frame> {
    let expected = plane_len(width, height)?
        .checked_mul(3)
        .ok_or_else(|| anyhow!("packed frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "packed frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }
    // Drivers may hand back padded buffers; only the leading image is used.
    Frame::new(pixels[..expected].to_vec(), width, height, order)
}

fn plane_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even width, got {width}"));
    }
    let count = plane_len(width, height)?;
    let expected = count * 2;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(count * 3);
    for quad in pixels[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        rgb.extend_from_slice(&yuv_to_rgb(quad[0] as f32, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(quad[2] as f32, u, v));
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height)?;
    let expected = y_plane + y_plane / 2;
    if pixels.len() < expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            let offset = (j * w + i) * 3;
            rgb[offset..offset + 3].copy_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    [
        clamp_to_u8(y + 1.402 * v),
        clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v),
        clamp_to_u8(y + 1.772 * u),
    ]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
