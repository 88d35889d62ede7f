// neurograd-core/src/ops/structural.rs

use super::apply_single;
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;

/// Copies its input unchanged. Useful for decoupling graph regions.
pub fn identity(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Identity), &[x])
}

#[derive(Debug, Clone)]
pub struct Identity;

impl Operator for Identity {
    fn name(&self) -> &'static str {
        "Identity"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        Ok(vec![input_shapes[0].to_vec()])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        outputs[0].data.copy_from_slice(inputs[0].data);
        Ok(())
    }

    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        Ok(vec![propagate[0].then(|| output_grads[0].data.to_vec())])
    }
}

/// Splits a tensor along its first axis into `shape[0]` outputs, one per
/// slice. The outputs carry the remaining axes.
pub fn split(
    graph: &mut Graph,
    x: VariableId,
    parts: usize,
) -> Result<Vec<VariableId>, NeuroGradError> {
    graph.apply(Box::new(Split { parts }), &[x])
}

#[derive(Debug, Clone)]
pub struct Split {
    pub parts: usize,
}

impl Operator for Split {
    fn name(&self) -> &'static str {
        "Split"
    }

    fn io_arity(&self) -> (usize, usize) {
        (1, self.parts)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        let shape = input_shapes[0];
        if shape.first() != Some(&self.parts) {
            return Err(NeuroGradError::ShapeMismatch {
                expected: vec![self.parts],
                actual: shape.to_vec(),
                operation: self.name().to_string(),
            });
        }
        Ok(vec![shape[1..].to_vec(); self.parts])
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        let slice_len = inputs[0].data.len() / self.parts;
        for (i, out) in outputs.iter_mut().enumerate() {
            let src = &inputs[0].data[i * slice_len..(i + 1) * slice_len];
            out.data.copy_from_slice(src);
        }
        Ok(())
    }

    // Output gradients concatenate back into a single input gradient; the
    // executor supplies zeros for outputs that never received a gradient.
    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        Ok(vec![propagate[0].then(|| {
            let mut grad = Vec::with_capacity(inputs[0].data.len());
            for g in output_grads {
                grad.extend_from_slice(g.data);
            }
            grad
        })])
    }
}
