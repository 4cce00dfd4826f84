//! capture_frame - grab one frame from a camera to check it works

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use catwatch::ingest::device_path;
use catwatch::{open_source, CaptureConfig, FrameSource};

/// Reads discarded while exposure and white balance settle.
const WARMUP_READS: usize = 3;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera device index.
    #[arg(long, default_value_t = 0)]
    device: u32,
    /// Explicit source, overriding --device.
    #[arg(long)]
    source: Option<String>,
    /// Requested frame width.
    #[arg(long, default_value_t = 1280)]
    width: u32,
    /// Requested frame height.
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// Where to save the captured frame.
    #[arg(long, default_value = "frame.jpg")]
    save: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = CaptureConfig {
        source: args.source.unwrap_or_else(|| device_path(args.device)),
        width: args.width,
        height: args.height,
        fps: 0,
    };
    let mut source = open_source(config).context("open camera")?;

    std::thread::sleep(Duration::from_millis(200));
    for _ in 0..WARMUP_READS {
        if let Err(err) = source.next_frame() {
            log::warn!("warm-up read failed: {:#}", err);
        }
    }

    let frame = source.next_frame().context("read frame from camera")?;
    log::info!(
        "captured {}x{} frame from {}",
        frame.width,
        frame.height,
        source.describe()
    );

    let image = frame.to_rgb_image();
    save_jpeg(&image, &args.save)?;
    println!("Saved frame to {}", args.save.display());
    Ok(())
}

fn save_jpeg(image: &image::RgbImage, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .with_context(|| format!("save frame to {}", path.display()))
}
