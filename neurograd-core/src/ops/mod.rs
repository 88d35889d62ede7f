// Representative operator catalog. The executor depends only on the
// `Operator` trait; everything here is an ordinary implementation of it.

pub mod activation;
pub mod arithmetic;
pub mod linalg;
pub mod math;
pub mod reduction;
pub mod structural;

pub use activation::relu;
pub use arithmetic::{add, add_scalar, mul, mul_scalar, sub};
pub use linalg::matmul;
pub use math::{exp, floor, log, sin};
pub use reduction::{mean, sum};
pub use structural::{identity, split};

use crate::error::NeuroGradError;
use crate::function::Operator;
use crate::graph::Graph;
use crate::variable::VariableId;

/// Applies a single-output operator and unwraps its output handle.
pub(crate) fn apply_single(
    graph: &mut Graph,
    op: Box<dyn Operator>,
    inputs: &[VariableId],
) -> Result<VariableId, NeuroGradError> {
    let name = op.name();
    let outputs = graph.apply(op, inputs)?;
    outputs.into_iter().next().ok_or_else(|| {
        NeuroGradError::InternalError(format!("{} produced no output", name))
    })
}

/// Shape contract shared by the element-wise binary operators: both inputs
/// must have identical shapes (no implicit broadcasting in this core).
pub(crate) fn same_shape_binary(
    input_shapes: &[&[usize]],
    operation: &str,
) -> Result<Vec<Vec<usize>>, NeuroGradError> {
    if input_shapes[0] != input_shapes[1] {
        return Err(NeuroGradError::ShapeMismatch {
            expected: input_shapes[0].to_vec(),
            actual: input_shapes[1].to_vec(),
            operation: operation.to_string(),
        });
    }
    Ok(vec![input_shapes[0].to_vec()])
}

/// Element-wise map of one input plane into one output plane.
pub(crate) fn map_unary(
    input: &[f32],
    output: &mut [f32],
    f: impl Fn(f32) -> f32,
) {
    for (o, &x) in output.iter_mut().zip(input.iter()) {
        *o = f(x);
    }
}

/// Element-wise combination of two input planes into one output plane.
pub(crate) fn map_binary(
    a: &[f32],
    b: &[f32],
    output: &mut [f32],
    f: impl Fn(f32, f32) -> f32,
) {
    for (o, (&x, &y)) in output.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = f(x, y);
    }
}
