//! Frame ingestion sources.
//!
//! - Local V4L2 cameras (feature: ingest-v4l2)
//! - Still images replayed from a file or directory
//! - Synthetic frames (`stub://`, testing)
//!
//! Every source hands out owned RGB/BGR `Frame`s. `connect` failures are fatal at startup;
//! `next_frame` failures only cost the current tick.

mod camera;
pub mod normalize;
mod still;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::CameraSource;
pub use still::StillImageSource;

/// Capture settings for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// `stub://…`, an image file or directory, or a device node such as `/dev/video0`.
    pub source: String,
    /// Requested frame size. Devices may negotiate something else.
    pub width: u32,
    pub height: u32,
    /// Requested frame rate, 0 leaves the device default.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: device_path(0),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Device node for a camera index.
pub fn device_path(camera_index: u32) -> String {
    format!("/dev/video{camera_index}")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub read_failures: u64,
}

/// A pull-based frame producer.
pub trait FrameSource {
    fn connect(&mut self) -> Result<()>;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;

    /// Human-readable identity for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open and connect the source named by `config.source`.
pub fn open_source(config: CaptureConfig) -> Result<CameraSource> {
    let mut source = CameraSource::new(config)?;
    source.connect()?;
    Ok(source)
}
