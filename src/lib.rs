//! catwatch
//!
//! Debounced presence events on top of a per-frame object detector: a camera feeds frames
//! to a detector model, detections are reduced to one target class above a confidence
//! floor, and a snapshot event is raised only after the target has been seen in every frame
//! for a configured duration.
//!
//! # Module Structure
//!
//! - `frame`: owned 8-bit 3-channel frames
//! - `letterbox`: frame ↔ model canvas mapping
//! - `detect`: inference engines, the model adapter and the target filter
//! - `debounce`: persistence state machine
//! - `ingest`: frame sources (V4L2 cameras, still images, synthetic)
//! - `sink`: event snapshots
//! - `pipeline`: the per-frame loop tying the above together
//! - `thermal`: board temperature for status logging
//! - `config`: file + environment configuration

pub mod config;
pub mod debounce;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod letterbox;
pub mod pipeline;
pub mod sink;
pub mod thermal;

pub use config::CatwatchConfig;
pub use debounce::{PersistenceDebouncer, PersistenceState, Trigger};
pub use detect::{
    decode_output, filter_detections, open_engine, Detection, InferenceEngine, ModelAdapter,
    ModelInput, StubEngine, TargetFilter,
};
pub use frame::{ColorOrder, Frame};
pub use ingest::{open_source, CameraSource, CaptureConfig, FrameSource, SourceStats};
pub use letterbox::{Letterbox, TensorLayout, LETTERBOX_FILL};
pub use pipeline::{
    Clock, FpsMeter, MonotonicClock, Pipeline, RunSummary, TickOutcome, TickReport,
};
pub use sink::{Event, EventSink, SnapshotDir};
pub use thermal::ThermalProbe;
