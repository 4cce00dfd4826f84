use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use ndarray::{Array2, Array4, ArrayD};

use crate::detect::backend::InferenceEngine;

/// Scripted engine for tests and `stub://` model paths.
///
/// Each `run` pops the next scripted output. Once the script is exhausted every run returns
/// an empty `(0, 6)` detection table.
pub struct StubEngine {
    input_shape: Vec<Option<usize>>,
    script: VecDeque<Result<ArrayD<f32>, String>>,
    prepared: Option<[usize; 4]>,
    last_input_shape: Option<Vec<usize>>,
    runs: usize,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            input_shape: vec![Some(1), Some(3), Some(640), Some(640)],
            script: VecDeque::new(),
            prepared: None,
            last_input_shape: None,
            runs: 0,
        }
    }

    pub fn with_input_shape(mut self, shape: Vec<Option<usize>>) -> Self {
        self.input_shape = shape;
        self
    }

    /// Queue a raw output tensor.
    pub fn push_output(mut self, output: ArrayD<f32>) -> Self {
        self.script.push_back(Ok(output));
        self
    }

    /// Queue a `(N, 6)` table of canvas-space rows.
    pub fn push_detections(self, rows: &[[f32; 6]]) -> Self {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let table = Array2::from_shape_vec((rows.len(), 6), flat)
            .map(|table| table.into_dyn())
            .unwrap_or_else(|_| empty_table());
        self.push_output(table)
    }

    /// Queue a failing run.
    pub fn push_failure(mut self, message: &str) -> Self {
        self.script.push_back(Err(message.to_string()));
        self
    }

    pub fn prepared_shape(&self) -> Option<[usize; 4]> {
        self.prepared
    }

    pub fn last_input_shape(&self) -> Option<&[usize]> {
        self.last_input_shape.as_deref()
    }

    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_shape(&self) -> Vec<Option<usize>> {
        self.input_shape.clone()
    }

    fn prepare(&mut self, shape: [usize; 4]) -> Result<()> {
        self.prepared = Some(shape);
        Ok(())
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        self.runs += 1;
        self.last_input_shape = Some(input.shape().to_vec());
        match self.script.pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(empty_table()),
        }
    }
}

fn empty_table() -> ArrayD<f32> {
    Array2::<f32>::zeros((0, 6)).into_dyn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_plays_script_then_returns_empty() -> Result<()> {
        let mut engine = StubEngine::new()
            .push_detections(&[[0.0, 0.0, 1.0, 1.0, 0.9, 15.0]])
            .push_failure("boom");
        let input = Array4::<f32>::zeros((1, 3, 2, 2));

        assert_eq!(engine.run(input.clone())?.shape(), &[1, 6]);
        assert!(engine.run(input.clone()).is_err());
        assert_eq!(engine.run(input)?.shape(), &[0, 6]);
        assert_eq!(engine.runs(), 3);
        assert_eq!(engine.last_input_shape(), Some(&[1, 3, 2, 2][..]));
        Ok(())
    }
}
