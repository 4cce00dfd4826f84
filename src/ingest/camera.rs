//! Camera frame source.
//!
//! `CameraSource` picks a backend from the configured source string:
//! - `stub://…` generates synthetic frames (tests, dry runs)
//! - an existing image file or directory replays stills
//! - anything else is opened as a V4L2 device node
//!
//! The device is released when the source is dropped.

use std::path::Path;
#[cfg(feature = "ingest-v4l2")]
use std::time::{Duration, Instant};

use anyhow::Result;
#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

#[cfg(feature = "ingest-v4l2")]
use super::normalize::{normalize_frame, PixelFormat};
use super::{CaptureConfig, FrameSource, SourceStats, StillImageSource};
use crate::frame::{ColorOrder, Frame};

pub struct CameraSource {
    config: CaptureConfig,
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    Stills(StillImageSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let backend = if config.source.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticCamera::new(&config))
        } else if is_still_path(&config.source) {
            CameraBackend::Stills(StillImageSource::new(&config.source))
        } else {
            device_backend(&config)?
        };
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

#[cfg(feature = "ingest-v4l2")]
fn device_backend(config: &CaptureConfig) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(DeviceCamera::new(config.clone())))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn device_backend(config: &CaptureConfig) -> Result<CameraBackend> {
    Err(anyhow::anyhow!(
        "camera {} requires the ingest-v4l2 feature",
        config.source
    ))
}

fn is_still_path(source: &str) -> bool {
    let path = Path::new(source);
    path.is_dir() || (path.is_file() && super::still::has_image_extension(path))
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            CameraBackend::Stills(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            CameraBackend::Stills(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            CameraBackend::Stills(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats.clone(),
            CameraBackend::Stills(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats.clone(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(_) => format!("{} (synthetic)", self.config.source),
            CameraBackend::Stills(source) => source.describe(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => format!(
                "{} ({}x{})",
                self.config.source, source.active_width, source.active_height
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    stats: SourceStats,
}

impl SyntheticCamera {
    fn new(config: &CaptureConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            stats: SourceStats::default(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: synthetic {}x{} stream ready",
            self.width,
            self.height
        );
        Ok(())
    }

    /// Diagonal gradient that drifts one step per frame.
    fn next_frame(&mut self) -> Result<Frame> {
        let shift = self.stats.frames_captured;
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let v = ((x + y) as u64 + shift) % 256;
                pixels.extend_from_slice(&[v as u8, (255 - v) as u8, 128]);
            }
        }
        self.stats.frames_captured += 1;
        Frame::new(pixels, self.width, self.height, ColorOrder::Rgb)
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 source
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
const STREAM_BUFFERS: u32 = 4;

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CaptureConfig,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    stats: SourceStats,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CaptureConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            last_frame_at: None,
            last_error: None,
            stats: SourceStats::default(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = &self.config.source;
        let mut device =
            v4l::Device::with_path(path).with_context(|| format!("open camera {path}"))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("CameraSource: failed to set format on {path}: {err}");
                device
                    .format()
                    .context("read camera format after set failure")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow::anyhow!("camera {path} negotiated unsupported format {}", format.fourcc)
        })?;

        if self.config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("CameraSource: failed to set fps on {path}: {err}");
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: opened {} ({}x{} {:?}, requested {}x{}@{})",
            path,
            self.active_width,
            self.active_height,
            self.format,
            self.config.width,
            self.config.height,
            self.config.fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("camera not connected")?;
        let captured = state.with_mut(|fields| {
            fields.stream.next().map(|(buf, meta)| {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                buf[..used].to_vec()
            })
        });
        let bytes = match captured {
            Ok(bytes) => bytes,
            Err(err) => {
                self.stats.read_failures += 1;
                self.last_error = Some(err.to_string());
                return Err(anyhow::Error::new(err).context("capture camera frame"));
            }
        };

        let frame = normalize_frame(&bytes, self.active_width, self.active_height, self.format)
            .map_err(|err| {
                self.stats.read_failures += 1;
                err
            })?;
        self.stats.frames_captured += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.fps == 0 {
            2_000
        } else {
            (1000 / self.config.fps).saturating_mul(6)
        };
        Duration::from_millis(u64::from(base_ms.max(2_000)))
    }
}

#[cfg(feature = "ingest-v4l2")]
impl Drop for DeviceCamera {
    fn drop(&mut self) {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.source);
        }
    }
}
