//! Letterbox mapping between camera frames and the detector input canvas.
//!
//! A frame is resized by a single uniform `scale` and centered on a gray canvas of the
//! model's spatial size. Boxes coming back from the detector are mapped to frame space with
//! the same stored `scale` on both axes, never a ratio recomputed from the rounded resize.

use anyhow::{anyhow, Result};
use image::imageops;
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::frame::Frame;

/// Canvas background value for every channel.
pub const LETTERBOX_FILL: u8 = 114;

/// Position of the channel axis in the model input tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub frame_w: u32,
    pub frame_h: u32,
    pub resized_w: u32,
    pub resized_h: u32,
    pub canvas_w: u32,
    pub canvas_h: u32,
    pub layout: TensorLayout,
}

impl Letterbox {
    pub fn compute(
        frame_w: u32,
        frame_h: u32,
        canvas_w: u32,
        canvas_h: u32,
        layout: TensorLayout,
    ) -> Result<Self> {
        if frame_w == 0 || frame_h == 0 {
            return Err(anyhow!("frame dimensions must be non-zero, got {frame_w}x{frame_h}"));
        }
        if canvas_w == 0 || canvas_h == 0 {
            return Err(anyhow!(
                "canvas dimensions must be non-zero, got {canvas_w}x{canvas_h}"
            ));
        }

        let scale = (canvas_w as f32 / frame_w as f32).min(canvas_h as f32 / frame_h as f32);
        let resized_w = ((frame_w as f32 * scale).round() as u32).clamp(1, canvas_w);
        let resized_h = ((frame_h as f32 * scale).round() as u32).clamp(1, canvas_h);

        Ok(Self {
            scale,
            pad_x: (canvas_w - resized_w) / 2,
            pad_y: (canvas_h - resized_h) / 2,
            frame_w,
            frame_h,
            resized_w,
            resized_h,
            canvas_w,
            canvas_h,
            layout,
        })
    }

    /// Frame-space point to canvas space.
    pub fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.pad_x as f32,
            y * self.scale + self.pad_y as f32,
        )
    }

    /// Canvas-space point to frame space.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }

    /// Map an `[x1, y1, x2, y2]` box from canvas space back to frame space.
    pub fn box_to_frame(&self, bbox: [f32; 4]) -> [f32; 4] {
        let (x1, y1) = self.to_frame(bbox[0], bbox[1]);
        let (x2, y2) = self.to_frame(bbox[2], bbox[3]);
        [x1, y1, x2, y2]
    }

    pub fn box_to_canvas(&self, bbox: [f32; 4]) -> [f32; 4] {
        let (x1, y1) = self.to_canvas(bbox[0], bbox[1]);
        let (x2, y2) = self.to_canvas(bbox[2], bbox[3]);
        [x1, y1, x2, y2]
    }

    /// Resize `frame` into a gray canvas, returned as RGB.
    pub fn render(&self, frame: &Frame) -> Result<RgbImage> {
        if frame.width != self.frame_w || frame.height != self.frame_h {
            return Err(anyhow!(
                "frame size {}x{} does not match letterbox source {}x{}",
                frame.width,
                frame.height,
                self.frame_w,
                self.frame_h
            ));
        }

        let rgb = frame.to_rgb_image();
        let resized = if rgb.dimensions() == (self.resized_w, self.resized_h) {
            rgb
        } else {
            resize_bilinear(&rgb, self.resized_w, self.resized_h)
        };

        let mut canvas =
            RgbImage::from_pixel(self.canvas_w, self.canvas_h, Rgb([LETTERBOX_FILL; 3]));
        imageops::replace(
            &mut canvas,
            &resized,
            i64::from(self.pad_x),
            i64::from(self.pad_y),
        );
        Ok(canvas)
    }

    /// Pack an RGB canvas into a batch-of-one f32 tensor scaled to `0..=1`.
    pub fn pack(&self, canvas: &RgbImage) -> Array4<f32> {
        let width = canvas.width() as usize;
        let height = canvas.height() as usize;
        let raw = canvas.as_raw();
        let at = |y: usize, x: usize, c: usize| raw[(y * width + x) * 3 + c] as f32 / 255.0;

        match self.layout {
            TensorLayout::Nchw => {
                Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| at(y, x, c))
            }
            TensorLayout::Nhwc => {
                Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| at(y, x, c))
            }
        }
    }
}

/// Half-pixel-centred bilinear resize. Unlike `FilterType::Triangle` the kernel does not
/// widen on downscale, so each output pixel blends at most a 2x2 source neighbourhood.
fn resize_bilinear(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = src.dimensions();
    let step_x = src_w as f32 / width as f32;
    let step_y = src_h as f32 / height as f32;
    let max_x = (src_w - 1) as f32;
    let max_y = (src_h - 1) as f32;

    RgbImage::from_fn(width, height, |x, y| {
        let sx = ((x as f32 + 0.5) * step_x - 0.5).clamp(0.0, max_x);
        let sy = ((y as f32 + 0.5) * step_y - 0.5).clamp(0.0, max_y);
        imageops::interpolate_bilinear(src, sx, sy)
            .unwrap_or_else(|| *src.get_pixel(sx as u32, sy as u32))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColorOrder;

    fn assert_close(a: [f32; 4], b: [f32; 4], tol: f32) {
        for i in 0..4 {
            assert!(
                (a[i] - b[i]).abs() <= tol,
                "coordinate {} differs: {:?} vs {:?}",
                i,
                a,
                b
            );
        }
    }

    #[test]
    fn landscape_frame_pads_vertically() -> Result<()> {
        let lb = Letterbox::compute(1280, 720, 640, 640, TensorLayout::Nchw)?;
        assert_eq!(lb.scale, 0.5);
        assert_eq!((lb.resized_w, lb.resized_h), (640, 360));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 140));
        Ok(())
    }

    #[test]
    fn portrait_frame_pads_horizontally() -> Result<()> {
        let lb = Letterbox::compute(480, 640, 640, 640, TensorLayout::Nchw)?;
        assert_eq!((lb.resized_w, lb.resized_h), (480, 640));
        assert_eq!((lb.pad_x, lb.pad_y), (80, 0));
        Ok(())
    }

    #[test]
    fn odd_padding_floors() -> Result<()> {
        let lb = Letterbox::compute(100, 99, 100, 100, TensorLayout::Nchw)?;
        assert_eq!(lb.resized_h, 99);
        assert_eq!(lb.pad_y, 0);
        Ok(())
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(Letterbox::compute(0, 10, 640, 640, TensorLayout::Nchw).is_err());
        assert!(Letterbox::compute(10, 10, 640, 0, TensorLayout::Nchw).is_err());
    }

    #[test]
    fn boxes_round_trip_within_a_pixel() -> Result<()> {
        let frames = [(1280, 720), (640, 480), (333, 1000), (1920, 1080), (17, 9)];
        let canvases = [(640, 640), (320, 256), (416, 640), (1024, 576)];
        for &(fw, fh) in &frames {
            for &(cw, ch) in &canvases {
                let lb = Letterbox::compute(fw, fh, cw, ch, TensorLayout::Nchw)?;
                let original = [fw as f32 * 0.1, fh as f32 * 0.25, fw as f32 * 0.9, fh as f32];
                let back = lb.box_to_frame(lb.box_to_canvas(original));
                assert_close(back, original, 1.0);
            }
        }
        Ok(())
    }

    #[test]
    fn non_square_canvas_uses_stored_scale_on_both_axes() -> Result<()> {
        // Rounding makes resized_h / frame_h differ from the stored scale here.
        let lb = Letterbox::compute(1000, 333, 640, 640, TensorLayout::Nchw)?;
        assert_eq!(lb.resized_h, 213);
        let rounded_ratio = lb.resized_h as f32 / 333.0;
        assert!((rounded_ratio - lb.scale).abs() > 1e-4);

        let bottom = lb.pad_y as f32 + 333.0 * lb.scale;
        let (_, y) = lb.to_frame(0.0, bottom);
        assert!((y - 333.0).abs() < 1e-3);

        let wide = Letterbox::compute(1280, 720, 640, 384, TensorLayout::Nchw)?;
        let mapped = wide.box_to_frame([0.0, wide.pad_y as f32, 640.0, 372.0]);
        assert_close(mapped, [0.0, 0.0, 1280.0, 720.0], 1e-3);
        Ok(())
    }

    #[test]
    fn render_places_content_at_padding_offset() -> Result<()> {
        let mut image = RgbImage::new(320, 240);
        for y in 50..100 {
            for x in 100..200 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let frame = Frame::from_rgb_image(image);
        let lb = Letterbox::compute(320, 240, 640, 640, TensorLayout::Nchw)?;
        assert_eq!((lb.pad_x, lb.pad_y), (0, 80));

        let canvas = lb.render(&frame)?;
        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(canvas.get_pixel(10, 10).0, [LETTERBOX_FILL; 3]);
        assert_eq!(canvas.get_pixel(10, 639).0, [LETTERBOX_FILL; 3]);

        let bright: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, px)| px.0[0] > 127)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = bright.iter().map(|p| p.0).min().unwrap_or(0) as f32;
        let max_x = bright.iter().map(|p| p.0).max().unwrap_or(0) as f32;
        let min_y = bright.iter().map(|p| p.1).min().unwrap_or(0) as f32;
        let max_y = bright.iter().map(|p| p.1).max().unwrap_or(0) as f32;

        let found = lb.box_to_frame([min_x, min_y, max_x, max_y]);
        assert_close(found, [100.0, 50.0, 199.0, 99.0], 1.0);
        Ok(())
    }

    #[test]
    fn render_rejects_mismatched_frame() -> Result<()> {
        let lb = Letterbox::compute(320, 240, 640, 640, TensorLayout::Nchw)?;
        let frame = Frame::filled(32, 24, [0, 0, 0])?;
        assert!(lb.render(&frame).is_err());
        Ok(())
    }

    #[test]
    fn downscale_blends_only_neighbouring_pixels() -> Result<()> {
        let columns = [0u8, 0, 100, 200];
        let pixels = columns.iter().flat_map(|&v| [v, v, v]).collect();
        let frame = Frame::new(pixels, 4, 1, ColorOrder::Rgb)?;
        let lb = Letterbox::compute(4, 1, 2, 1, TensorLayout::Nchw)?;
        assert_eq!((lb.resized_w, lb.resized_h), (2, 1));

        let canvas = lb.render(&frame)?;
        assert_eq!(canvas.get_pixel(0, 0).0, [0; 3]);
        assert_eq!(canvas.get_pixel(1, 0).0, [150; 3]);
        Ok(())
    }

    #[test]
    fn pack_respects_layout() -> Result<()> {
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, ColorOrder::Rgb)?;

        let nchw = Letterbox::compute(2, 1, 2, 1, TensorLayout::Nchw)?;
        let tensor = nchw.pack(&nchw.render(&frame)?);
        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 2, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);

        let nhwc = Letterbox::compute(2, 1, 2, 1, TensorLayout::Nhwc)?;
        let tensor = nhwc.pack(&nhwc.render(&frame)?);
        assert_eq!(tensor.shape(), &[1, 1, 2, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        Ok(())
    }

    #[test]
    fn pack_converts_bgr_input() -> Result<()> {
        let frame = Frame::new(vec![0, 0, 255], 1, 1, ColorOrder::Bgr)?;
        let lb = Letterbox::compute(1, 1, 1, 1, TensorLayout::Nchw)?;
        let tensor = lb.pack(&lb.render(&frame)?);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 0.0);
        Ok(())
    }
}
