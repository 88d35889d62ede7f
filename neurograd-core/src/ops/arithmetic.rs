// neurograd-core/src/ops/arithmetic.rs

use super::{apply_single, map_binary, map_unary, same_shape_binary};
use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::function::{DoubleBackwardGrads, Operator};
use crate::graph::Graph;
use crate::variable::VariableId;

// --- Add ---

/// Element-wise addition of two variables of identical shape.
pub fn add(graph: &mut Graph, a: VariableId, b: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Add), &[a, b])
}

#[derive(Debug, Clone)]
pub struct Add;

impl Operator for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn io_arity(&self) -> (usize, usize) {
        (2, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        same_shape_binary(input_shapes, self.name())
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_binary(inputs[0].data, inputs[1].data, outputs[0].data, |x, y| x + y);
        Ok(())
    }

    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let g = output_grads[0].data;
        Ok(vec![
            propagate[0].then(|| g.to_vec()),
            propagate[1].then(|| g.to_vec()),
        ])
    }
}

// --- Sub ---

/// Element-wise subtraction `a - b`.
pub fn sub(graph: &mut Graph, a: VariableId, b: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Sub), &[a, b])
}

#[derive(Debug, Clone)]
pub struct Sub;

impl Operator for Sub {
    fn name(&self) -> &'static str {
        "Sub"
    }

    fn io_arity(&self) -> (usize, usize) {
        (2, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        same_shape_binary(input_shapes, self.name())
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_binary(inputs[0].data, inputs[1].data, outputs[0].data, |x, y| x - y);
        Ok(())
    }

    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let g = output_grads[0].data;
        Ok(vec![
            propagate[0].then(|| g.to_vec()),
            propagate[1].then(|| g.iter().map(|&v| -v).collect()),
        ])
    }
}

// --- Mul ---

/// Element-wise multiplication. Supports double-backward.
pub fn mul(graph: &mut Graph, a: VariableId, b: VariableId) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(Mul), &[a, b])
}

#[derive(Debug, Clone)]
pub struct Mul;

impl Operator for Mul {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn io_arity(&self) -> (usize, usize) {
        (2, 1)
    }

    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError> {
        same_shape_binary(input_shapes, self.name())
    }

    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError> {
        map_binary(inputs[0].data, inputs[1].data, outputs[0].data, |x, y| x * y);
        Ok(())
    }

    fn backward(
        &self,
        inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let g = output_grads[0].data;
        let a = inputs[0].data;
        let b = inputs[1].data;
        Ok(vec![
            propagate[0].then(|| g.iter().zip(b.iter()).map(|(&gv, &bv)| gv * bv).collect()),
            propagate[1].then(|| g.iter().zip(a.iter()).map(|(&gv, &av)| gv * av).collect()),
        ])
    }

    fn has_double_backward(&self) -> bool {
        true
    }

    // backward produces ga = gy * b and gb = gy * a; differentiating those
    // w.r.t. (a, b, gy) against the seeds (ha, hb) gives:
    //   d/da = hb * gy,  d/db = ha * gy,  d/dgy = ha * b + hb * a
    fn double_backward(
        &self,
        inputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        grad_grads: &[Option<ArrayView<'_>>],
        propagate: &[bool],
    ) -> Result<DoubleBackwardGrads, NeuroGradError> {
        let a = inputs[0].data;
        let b = inputs[1].data;
        let gy = output_grads[0].data;
        let ha = grad_grads[0].as_ref().map(|v| v.data);
        let hb = grad_grads[1].as_ref().map(|v| v.data);

        let wrt_a = propagate[0].then(|| {
            (0..a.len())
                .map(|i| hb.map_or(0.0, |h| h[i] * gy[i]))
                .collect()
        });
        let wrt_b = propagate[1].then(|| {
            (0..b.len())
                .map(|i| ha.map_or(0.0, |h| h[i] * gy[i]))
                .collect()
        });
        let wrt_gy = (0..gy.len())
            .map(|i| ha.map_or(0.0, |h| h[i] * b[i]) + hb.map_or(0.0, |h| h[i] * a[i]))
            .collect();

        Ok(DoubleBackwardGrads {
            wrt_inputs: vec![wrt_a, wrt_b],
            wrt_output_grads: vec![Some(wrt_gy)],
        })
    }
}

// --- Scalar-argument operators ---

/// Adds a fixed scalar to every element. The addend is an operator argument,
/// fixed at construction.
pub fn add_scalar(
    graph: &mut Graph,
    x: VariableId,
    addend: f32,
) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(AddScalar { addend }), &[x])
}

#[derive(Debug, Clone)]
pub struct AddScalar {
    pub addend: f32,
}

impl Operator for AddScalar {
    fn name(&self) -> &'static str {
        "AddScalar"
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
        let addend = self.addend;
        map_unary(inputs[0].data, outputs[0].data, |x| x + addend);
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

/// Multiplies every element by a fixed scalar factor.
pub fn mul_scalar(
    graph: &mut Graph,
    x: VariableId,
    factor: f32,
) -> Result<VariableId, NeuroGradError> {
    apply_single(graph, Box::new(MulScalar { factor }), &[x])
}

#[derive(Debug, Clone)]
pub struct MulScalar {
    pub factor: f32,
}

impl Operator for MulScalar {
    fn name(&self) -> &'static str {
        "MulScalar"
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
        let factor = self.factor;
        map_unary(inputs[0].data, outputs[0].data, |x| x * factor);
        Ok(())
    }

    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        output_grads: &[ArrayView<'_>],
        propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        let factor = self.factor;
        Ok(vec![propagate[0]
            .then(|| output_grads[0].data.iter().map(|&g| g * factor).collect())])
    }
}

// --- Tests ---
