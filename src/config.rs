use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::TargetFilter;
use crate::ingest::{device_path, CaptureConfig};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.55;
const DEFAULT_PERSISTENCE_TIME_S: f32 = 0.7;
const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
const DEFAULT_CAPTURE_HEIGHT: u32 = 720;
const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_MODEL_PATH: &str = "models/yolov8n.onnx";
/// COCO "cat".
const DEFAULT_TARGET_CLASS_ID: u32 = 15;
const DEFAULT_EVENTS_DIR: &str = "data/events";

#[derive(Debug, Deserialize, Default)]
struct CatwatchConfigFile {
    thresholds: Option<ThresholdsConfigFile>,
    device: Option<DeviceConfigFile>,
    model: Option<ModelConfigFile>,
    events: Option<EventsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    confidence_threshold: Option<f32>,
    persistence_time_s: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    camera_index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    source: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    target_class_id: Option<u32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct EventsConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatwatchConfig {
    pub confidence_threshold: f32,
    pub persistence_time_s: f32,
    pub device: DeviceSettings,
    pub model: ModelSettings,
    pub events_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub camera_index: u32,
    /// Capture size and rate are requests; the device may negotiate something else.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Overrides `camera_index`: `stub://…`, an image path, or a device node.
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub target_class_id: u32,
    /// `(width, height)` used when the model input is dynamic.
    pub input_size: Option<(u32, u32)>,
}

impl CatwatchConfig {
    /// Defaults, then the file named by `CATWATCH_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CATWATCH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit file taking the place of `CATWATCH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CatwatchConfigFile) -> Result<Self> {
        let thresholds = file.thresholds.unwrap_or_default();
        let device = file.device.unwrap_or_default();
        let model = file.model.unwrap_or_default();

        let input_size = match (model.input_width, model.input_height) {
            (Some(width), Some(height)) => Some((width, height)),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "model.input_width and model.input_height must be given together"
                ))
            }
        };

        Ok(Self {
            confidence_threshold: thresholds
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            persistence_time_s: thresholds
                .persistence_time_s
                .unwrap_or(DEFAULT_PERSISTENCE_TIME_S),
            device: DeviceSettings {
                camera_index: device.camera_index.unwrap_or(DEFAULT_CAMERA_INDEX),
                width: device.width.unwrap_or(DEFAULT_CAPTURE_WIDTH),
                height: device.height.unwrap_or(DEFAULT_CAPTURE_HEIGHT),
                fps: device.fps.unwrap_or(DEFAULT_CAPTURE_FPS),
                source: device.source.filter(|source| !source.trim().is_empty()),
            },
            model: ModelSettings {
                path: model
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                target_class_id: model.target_class_id.unwrap_or(DEFAULT_TARGET_CLASS_ID),
                input_size,
            },
            events_dir: file
                .events
                .and_then(|events| events.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENTS_DIR)),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("CATWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(source) = std::env::var("CATWATCH_SOURCE") {
            if !source.trim().is_empty() {
                self.device.source = Some(source);
            }
        }
        if let Ok(dir) = std::env::var("CATWATCH_EVENTS_DIR") {
            if !dir.trim().is_empty() {
                self.events_dir = PathBuf::from(dir);
            }
        }
        if let Ok(class_id) = std::env::var("CATWATCH_TARGET_CLASS") {
            self.model.target_class_id = class_id
                .trim()
                .parse()
                .map_err(|_| anyhow!("CATWATCH_TARGET_CLASS must be a non-negative integer"))?;
        }
        if let Ok(confidence) = std::env::var("CATWATCH_CONFIDENCE") {
            self.confidence_threshold = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("CATWATCH_CONFIDENCE must be a number"))?;
        }
        if let Ok(persistence) = std::env::var("CATWATCH_PERSISTENCE_S") {
            self.persistence_time_s = persistence
                .trim()
                .parse()
                .map_err(|_| anyhow!("CATWATCH_PERSISTENCE_S must be a number of seconds"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !self.persistence_time_s.is_finite() || self.persistence_time_s < 0.0 {
            return Err(anyhow!(
                "persistence_time_s must be a non-negative number of seconds, got {}",
                self.persistence_time_s
            ));
        }
        Duration::try_from_secs_f32(self.persistence_time_s).map_err(|_| {
            anyhow!(
                "persistence_time_s is too large to represent, got {}",
                self.persistence_time_s
            )
        })?;
        if self.device.width == 0 || self.device.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        if let Some((width, height)) = self.model.input_size {
            if width == 0 || height == 0 {
                return Err(anyhow!("model input size must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Persistence threshold; saturates for values `validate` would reject.
    pub fn persistence(&self) -> Duration {
        Duration::try_from_secs_f32(self.persistence_time_s.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn target_filter(&self) -> TargetFilter {
        TargetFilter::new(self.model.target_class_id, self.confidence_threshold)
    }

    /// Capture settings, resolving the camera index to a device node unless a source is set.
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            source: self
                .device
                .source
                .clone()
                .unwrap_or_else(|| device_path(self.device.camera_index)),
            width: self.device.width,
            height: self.device.height,
            fps: self.device.fps,
        }
    }
}

fn read_config_file(path: &Path) -> Result<CatwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() -> Result<()> {
        let cfg = CatwatchConfig::from_file(CatwatchConfigFile::default())?;
        assert_eq!(cfg.confidence_threshold, 0.55);
        assert_eq!(cfg.persistence_time_s, 0.7);
        assert_eq!(cfg.model.target_class_id, 15);
        assert_eq!(cfg.model.path, PathBuf::from("models/yolov8n.onnx"));
        assert_eq!(cfg.capture().source, "/dev/video0");
        assert_eq!((cfg.device.width, cfg.device.height, cfg.device.fps), (1280, 720, 30));
        cfg.validate()
    }

    #[test]
    fn partial_model_hint_is_rejected() {
        let file = CatwatchConfigFile {
            model: Some(ModelConfigFile {
                input_width: Some(640),
                ..ModelConfigFile::default()
            }),
            ..CatwatchConfigFile::default()
        };
        assert!(CatwatchConfig::from_file(file).is_err());
    }

    #[test]
    fn validation_bounds() -> Result<()> {
        let mut cfg = CatwatchConfig::from_file(CatwatchConfigFile::default())?;
        cfg.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        cfg.confidence_threshold = 0.5;
        cfg.persistence_time_s = -0.1;
        assert!(cfg.validate().is_err());
        cfg.persistence_time_s = f32::NAN;
        assert!(cfg.validate().is_err());
        cfg.persistence_time_s = 1e20;
        let err = cfg.validate().expect_err("overflowing persistence must fail");
        assert!(err.to_string().contains("persistence_time_s"));
        assert_eq!(cfg.persistence(), Duration::MAX);

        cfg.persistence_time_s = 0.0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.persistence(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn source_overrides_camera_index() -> Result<()> {
        let mut cfg = CatwatchConfig::from_file(CatwatchConfigFile::default())?;
        cfg.device.camera_index = 2;
        assert_eq!(cfg.capture().source, "/dev/video2");
        cfg.device.source = Some("stub://bench".to_string());
        assert_eq!(cfg.capture().source, "stub://bench");
        Ok(())
    }
}
