use anyhow::Result;
use ndarray::{Array4, ArrayD};

/// Inference engine trait.
///
/// The engine is a black box from one f32 input tensor to one f32 output tensor. It knows
/// nothing about frames, letterboxing or detections; `ModelAdapter` owns all of that.
pub trait InferenceEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Declared input shape. `None` marks a dynamic or symbolic dimension.
    fn input_shape(&self) -> Vec<Option<usize>>;

    /// Pin the concrete input shape. Called once, before the first `run`.
    fn prepare(&mut self, shape: [usize; 4]) -> Result<()> {
        let _ = shape;
        Ok(())
    }

    /// Run the model on a batch-of-one input tensor.
    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn input_shape(&self) -> Vec<Option<usize>> {
        (**self).input_shape()
    }

    fn prepare(&mut self, shape: [usize; 4]) -> Result<()> {
        (**self).prepare(shape)
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        (**self).run(input)
    }
}
