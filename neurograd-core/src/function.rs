// Defines the Operator capability interface and the Function graph node.

use crate::buffer::{ArrayView, ArrayViewMut};
use crate::error::NeuroGradError;
use crate::variable::VariableId;
use std::fmt::Debug;

/// Handle to a Function node in a `Graph` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub(crate) usize);

/// Gradients produced by a `double_backward` call: contributions with
/// respect to the forward inputs and with respect to the output gradients.
#[derive(Debug, Default)]
pub struct DoubleBackwardGrads {
    pub wrt_inputs: Vec<Option<Vec<f32>>>,
    pub wrt_output_grads: Vec<Option<Vec<f32>>>,
}

/// Capability interface implemented by every operator kind.
///
/// The executor depends only on this trait, never on concrete operator
/// types. Arity is fixed at construction; shapes are validated lazily by
/// `infer_output_shapes` when the executor reaches the function during a
/// forward pass.
pub trait Operator: Debug {
    /// Human-readable operator name, used in error and log messages.
    fn name(&self) -> &'static str;

    /// Declared `(n_inputs, n_outputs)` arity.
    fn io_arity(&self) -> (usize, usize);

    /// Validates input shapes and declares the output shapes.
    ///
    /// # Errors
    /// `ShapeMismatch` when the inputs violate the operator's shape
    /// contract, `DomainError` for operator-specific invalid configurations.
    fn infer_output_shapes(
        &self,
        input_shapes: &[&[usize]],
    ) -> Result<Vec<Vec<usize>>, NeuroGradError>;

    /// Pure computation from input data planes into output data planes.
    /// Must not consult any gradient state.
    fn forward(
        &self,
        inputs: &[ArrayView<'_>],
        outputs: &mut [ArrayViewMut<'_>],
    ) -> Result<(), NeuroGradError>;

    /// Computes the vector-Jacobian product for each input slot.
    ///
    /// Returns one `Option<Vec<f32>>` per input, in input order. Slots with
    /// `propagate[i] == false` do not need a gradient and may be returned as
    /// `None` (the executor never accumulates into them). The executor adds
    /// every returned contribution into the input's existing grad plane —
    /// operators never overwrite gradients.
    ///
    /// The default implementation fails with `NotImplemented`: forward-only
    /// operators are a legitimate terminal state and the error must reach
    /// the caller unchanged.
    fn backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _outputs: &[ArrayView<'_>],
        _output_grads: &[ArrayView<'_>],
        _propagate: &[bool],
    ) -> Result<Vec<Option<Vec<f32>>>, NeuroGradError> {
        Err(NeuroGradError::NotImplemented {
            operation: self.name().to_string(),
            capability: "backward".to_string(),
        })
    }

    /// Whether this operator can differentiate its own backward pass.
    fn has_double_backward(&self) -> bool {
        false
    }

    /// Differentiates the backward computation itself, for second-order
    /// gradients (e.g. gradient-penalty losses).
    ///
    /// `grad_grads[i]` is the upstream seed on the gradient this operator
    /// produced for input `i` during backward (`None` when that slot carried
    /// no gradient). Returns contributions with respect to the forward
    /// inputs and with respect to the output gradients.
    fn double_backward(
        &self,
        _inputs: &[ArrayView<'_>],
        _output_grads: &[ArrayView<'_>],
        _grad_grads: &[Option<ArrayView<'_>>],
        _propagate: &[bool],
    ) -> Result<DoubleBackwardGrads, NeuroGradError> {
        Err(NeuroGradError::NotImplemented {
            operation: self.name().to_string(),
            capability: "double_backward".to_string(),
        })
    }
}

/// A Function node: one operator application bound to specific input and
/// output variables. Immutable once constructed; the only side effects it
/// participates in are the buffer writes performed through the executor.
#[derive(Debug)]
pub(crate) struct FunctionNode {
    pub(crate) op: Box<dyn Operator>,
    pub(crate) inputs: Vec<VariableId>,
    pub(crate) outputs: Vec<VariableId>,
}
