use std::path::Path;

use anyhow::Result;

use super::backend::InferenceEngine;

pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubEngine;

#[cfg(feature = "backend-tract")]
pub use tract::TractEngine;

/// Open an engine for `model_path`.
///
/// `stub://` paths select the scripted stub engine (no model file, no detections).
/// Anything else is loaded as an ONNX file.
pub fn open_engine(model_path: &Path) -> Result<Box<dyn InferenceEngine>> {
    let display = model_path.to_string_lossy();
    if display.starts_with("stub://") {
        log::info!("model: using stub engine for {}", display);
        return Ok(Box::new(StubEngine::new()));
    }

    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(TractEngine::load(model_path)?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow::anyhow!(
            "loading {} requires the backend-tract feature",
            display
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_paths_open_without_a_file() -> Result<()> {
        let engine = open_engine(Path::new("stub://model"))?;
        assert_eq!(engine.name(), "stub");
        Ok(())
    }

    #[test]
    fn missing_model_file_is_an_error() {
        assert!(open_engine(Path::new("/nonexistent/catwatch/model.onnx")).is_err());
    }
}
