//! Model adapter.
//!
//! `ModelAdapter` owns one inference engine and the input geometry resolved from it at
//! construction. Each `detect` call letterboxes the frame onto the model canvas, packs it in
//! the model's layout, runs the engine and maps the returned boxes back to frame space.
//!
//! Policy constants: RGB channel order and `value / 255.0` normalisation. These must match
//! how the model was exported; they are not detected from the model.

use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, ArrayView2, Axis, Ix2};
use std::path::Path;

use super::backend::InferenceEngine;
use super::backends::open_engine;
use super::result::Detection;
use crate::frame::Frame;
use crate::letterbox::{Letterbox, TensorLayout};

/// Canvas edge used when the model does not declare static spatial dimensions.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Columns per output row: `x1, y1, x2, y2, score, class_id`.
const OUTPUT_COLUMNS: usize = 6;

/// Input geometry resolved from the model's declared input shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelInput {
    pub layout: TensorLayout,
    pub width: u32,
    pub height: u32,
    /// True when the spatial size came from the hint or the default, not the model.
    pub fallback: bool,
}

impl ModelInput {
    /// Infer layout and spatial size from a declared shape.
    ///
    /// Layout is a heuristic: a 3 in position 1 means channel-first, a trailing 3 means
    /// channel-last, anything else is treated as channel-first.
    pub fn resolve(shape: &[Option<usize>], size_hint: Option<(u32, u32)>) -> Self {
        let dim = |index: usize| {
            shape
                .get(index)
                .copied()
                .flatten()
                .filter(|d| *d > 0)
                .and_then(|d| u32::try_from(d).ok())
        };

        let layout = if dim(1) == Some(3) {
            TensorLayout::Nchw
        } else if shape.len() > 1 && dim(shape.len() - 1) == Some(3) {
            TensorLayout::Nhwc
        } else {
            TensorLayout::Nchw
        };

        let (height, width) = match (shape.len(), layout) {
            (4, TensorLayout::Nchw) => (dim(2), dim(3)),
            (4, TensorLayout::Nhwc) => (dim(1), dim(2)),
            _ => (None, None),
        };

        match (width, height) {
            (Some(width), Some(height)) => Self {
                layout,
                width,
                height,
                fallback: false,
            },
            _ => {
                let (width, height) =
                    size_hint.unwrap_or((DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE));
                Self {
                    layout,
                    width,
                    height,
                    fallback: true,
                }
            }
        }
    }

    /// Concrete batch-of-one tensor shape for this input.
    pub fn tensor_shape(&self) -> [usize; 4] {
        let (w, h) = (self.width as usize, self.height as usize);
        match self.layout {
            TensorLayout::Nchw => [1, 3, h, w],
            TensorLayout::Nhwc => [1, h, w, 3],
        }
    }
}

pub struct ModelAdapter<E> {
    engine: E,
    input: ModelInput,
}

impl ModelAdapter<Box<dyn InferenceEngine>> {
    /// Open the model at `model_path` with the matching engine backend.
    pub fn load<P: AsRef<Path>>(model_path: P, size_hint: Option<(u32, u32)>) -> Result<Self> {
        let engine = open_engine(model_path.as_ref())?;
        Self::new(engine, size_hint)
    }
}

impl<E: InferenceEngine> ModelAdapter<E> {
    pub fn new(mut engine: E, size_hint: Option<(u32, u32)>) -> Result<Self> {
        let declared = engine.input_shape();
        let input = ModelInput::resolve(&declared, size_hint);
        engine
            .prepare(input.tensor_shape())
            .with_context(|| format!("failed to prepare {} engine", engine.name()))?;

        log::info!(
            "model input: declared={:?} layout={:?} size={}x{}{}",
            declared,
            input.layout,
            input.width,
            input.height,
            if input.fallback { " (fallback)" } else { "" }
        );

        Ok(Self { engine, input })
    }

    /// Resolved layout and canvas size.
    pub fn input(&self) -> ModelInput {
        self.input
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn letterbox_for(&self, frame: &Frame) -> Result<Letterbox> {
        Letterbox::compute(
            frame.width,
            frame.height,
            self.input.width,
            self.input.height,
            self.input.layout,
        )
    }

    /// Run the detector on one frame. Boxes are returned in frame coordinates.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let letterbox = self.letterbox_for(frame)?;
        let canvas = letterbox.render(frame)?;
        let tensor = letterbox.pack(&canvas);

        let output = self
            .engine
            .run(tensor)
            .with_context(|| format!("{} inference failed", self.engine.name()))?;

        decode_output(&output, &letterbox)
    }
}

/// Decode `(N, 6)` or `(B, N, 6)` detector output into frame-space detections.
///
/// Only the first batch slice of a 3-D output is read. Any other shape is an error.
pub fn decode_output(output: &ArrayD<f32>, letterbox: &Letterbox) -> Result<Vec<Detection>> {
    let rows: ArrayView2<'_, f32> = match output.shape() {
        &[_, OUTPUT_COLUMNS] => output.view().into_dimensionality::<Ix2>()?,
        &[batch, _, OUTPUT_COLUMNS] if batch > 0 => output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()?,
        other => {
            return Err(anyhow!(
                "unexpected detector output shape {:?}, expected (N, {}) or (B, N, {})",
                other,
                OUTPUT_COLUMNS,
                OUTPUT_COLUMNS
            ))
        }
    };

    rows.outer_iter()
        .map(|row| {
            let class = row[5];
            if !class.is_finite() || class < 0.0 {
                return Err(anyhow!("detector returned invalid class id {}", class));
            }
            let [x1, y1, x2, y2] = letterbox.box_to_frame([row[0], row[1], row[2], row[3]]);
            Ok(Detection {
                x1: x1.min(x2),
                y1: y1.min(y2),
                x2: x1.max(x2),
                y2: y1.max(y2),
                score: row[4],
                class_id: class.trunc() as u32,
            })
        })
        .collect()
}
