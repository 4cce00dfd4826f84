//! Object detection: the engine seam, the model adapter and the target filter.

pub mod adapter;
mod backend;
pub mod backends;
pub mod filter;
mod result;

pub use adapter::{decode_output, ModelAdapter, ModelInput, DEFAULT_INPUT_SIZE};
pub use backend::InferenceEngine;
pub use backends::{open_engine, StubEngine};
#[cfg(feature = "backend-tract")]
pub use backends::TractEngine;
pub use filter::{filter_detections, TargetFilter};
pub use result::Detection;
