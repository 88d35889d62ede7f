// neurograd-core/src/ops/activation.rs

use super::{apply_single, map_unary};
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;

/// Rectified linear unit, `max(0, x)` element-wise.
pub fn relu(graph: &mut Graph, x: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(ReLU), &[x])
}

#[derive(Debug, Clone)]
pub struct ReLU;

impl Operator for ReLU {
    fn name(&self) -> &'static str {
        "ReLU"
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
        map_unary(inputs[0].data, outputs[0].data, |x| x.max(0.0));
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let x = inputs[0].data;
        let g = output_grads[0].data;
        Ok(vec![propagate[0].then(|| {
            g.iter()
                .zip(x.iter())
                .map(|(&gv, &xv)| if xv > 0.0 { gv } else { 0.0 })
                .collect()
        })])
    }
}
