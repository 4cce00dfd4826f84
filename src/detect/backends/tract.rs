use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ndarray::{Array4, ArrayD, IxDyn};
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::GenericFactoid;

use crate::detect::backend::InferenceEngine;

/// Tract-based engine for ONNX inference.
///
/// Loading reads the model's declared input fact without optimizing. `prepare` then pins
/// the resolved concrete shape, so models exported with symbolic height/width still get a
/// fully static optimized plan.
pub struct TractEngine {
    path: PathBuf,
    input_shape: Vec<Option<usize>>,
    pending: Option<InferenceModel>,
    plan: Option<TypedRunnableModel<TypedModel>>,
}

impl TractEngine {
    /// Load an ONNX model from disk.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref().to_path_buf();
        let model = tract_onnx::onnx()
            .model_for_path(&path)
            .with_context(|| format!("failed to load ONNX model from {}", path.display()))?;
        let fact = model
            .input_fact(0)
            .context("ONNX model declares no inputs")?;
        let input_shape = fact
            .shape
            .dims()
            .map(|dim| match dim {
                GenericFactoid::Only(d) => d
                    .to_i64()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(|v| v as usize),
                GenericFactoid::Any => None,
            })
            .collect();

        Ok(Self {
            path,
            input_shape,
            pending: Some(model),
            plan: None,
        })
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_shape(&self) -> Vec<Option<usize>> {
        self.input_shape.clone()
    }

    fn prepare(&mut self, shape: [usize; 4]) -> Result<()> {
        let model = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("tract engine for {} already prepared", self.path.display()))?;
        let plan = model
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(shape[0], shape[1], shape[2], shape[3]),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;
        self.input_shape = shape.iter().map(|d| Some(*d)).collect();
        self.plan = Some(plan);
        Ok(())
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| anyhow!("tract engine used before prepare"))?;

        let shape = input.shape().to_vec();
        let data = input.as_standard_layout();
        let data = data
            .as_slice()
            .ok_or_else(|| anyhow!("input tensor is not contiguous"))?;
        let tensor = Tensor::from_shape(&shape, data).context("failed to build input tensor")?;

        let outputs = plan.run(tvec!(tensor.into())).context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let out_shape = view.shape().to_vec();
        let values: Vec<f32> = view.iter().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&out_shape), values).context("failed to copy model output")
    }
}
