// neurograd-core/src/ops/reduction.rs

use super::apply_single;
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;

/// Sums all elements into a scalar (empty shape).
pub fn sum(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Sum), &[x])
}

#[derive(Debug, Clone)]
pub struct Sum;

impl Operator for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        _input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![Vec::new()]) // scalar
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        outputs[0].data[0] = inputs[0].data.iter().sum();
        Ok(())
    }

    // The scalar output gradient broadcasts to every input element.
    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let g = output_grads[0].data[0];
        let numel = inputs[0].data.len();
        Ok(vec![propagate[0].then(|| vec![g; numel])])
    }
}

/// Arithmetic mean of all elements, as a scalar.
pub fn mean(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Mean), &[x])
}

#[derive(Debug, Clone)]
pub struct Mean;

impl Operator for Mean {
    fn name(&self) -> &'static str {
        "Mean"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        let numel: usize = input_shapes[0].iter().product();
        if numel == 0 {
            return Err(NeuroGradError::DomainError {
                operation: self.name().to_string(),
                message: "mean of an empty tensor".to_string(),
            });
        }
        Ok(vec![Vec::new()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        let n = inputs[0].data.len() as f32;
        outputs[0].data[0] = inputs[0].data.iter().sum::<f32>() / n;
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let numel = inputs[0].data.len();
        let g = output_grads[0].data[0] / numel as f32;
        Ok(vec![propagate[0].then(|| vec![g; numel])])
    }
}
