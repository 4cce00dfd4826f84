//! detect_image - run the detector on one image and print what it finds
//!
//! Boxes above `--min-score` are drawn onto a copy of the image for a quick visual check.

use anyhow::{Context, Result};
use clap::Parser;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;

use catwatch::{Detection, Frame, ModelAdapter};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to run the detector on.
    image: PathBuf,
    /// ONNX model path (or stub:// for the scripted engine).
    #[arg(long, env = "CATWATCH_MODEL_PATH", default_value = "models/yolov8n.onnx")]
    model: PathBuf,
    /// Canvas edge used when the model input is dynamic.
    #[arg(long)]
    input_size: Option<u32>,
    /// Only draw detections scoring at least this much.
    #[arg(long, default_value_t = 0.4)]
    min_score: f32,
    /// Where to write the annotated copy.
    #[arg(long, default_value = "out.jpg")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let image = image::open(&args.image)
        .with_context(|| format!("read image {}", args.image.display()))?
        .to_rgb8();

    let mut adapter = ModelAdapter::load(&args.model, args.input_size.map(|s| (s, s)))?;
    log::info!("model input: {:?}", adapter.input());

    let frame = Frame::from_rgb_image(image);
    let detections = adapter.detect(&frame)?;

    println!("{} detection(s), first 5:", detections.len());
    for det in detections.iter().take(5) {
        println!(
            "  class {:>3} score {:.3} [{:.1}, {:.1}, {:.1}, {:.1}]",
            det.class_id, det.score, det.x1, det.y1, det.x2, det.y2
        );
    }

    let mut annotated = frame.to_rgb_image();
    for det in detections.iter().filter(|det| det.score >= args.min_score) {
        draw_box(&mut annotated, det);
    }
    annotated
        .save_with_format(&args.out, image::ImageFormat::Jpeg)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!("Wrote {}", args.out.display());
    Ok(())
}

/// Two-pixel outline, clipped to the image.
fn draw_box(image: &mut image::RgbImage, det: &Detection) {
    let max_x = image.width().saturating_sub(1) as f32;
    let max_y = image.height().saturating_sub(1) as f32;
    let x1 = det.x1.clamp(0.0, max_x) as i32;
    let y1 = det.y1.clamp(0.0, max_y) as i32;
    let x2 = det.x2.clamp(0.0, max_x) as i32;
    let y2 = det.y2.clamp(0.0, max_y) as i32;

    for inset in 0..2 {
        let width = (x2 - x1 - 2 * inset).max(1) as u32;
        let height = (y2 - y1 - 2 * inset).max(1) as u32;
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(width, height);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}
