//! neurograd-core: a define-by-connect automatic differentiation engine.
//!
//! Computation is expressed as a graph of variables and functions owned by a
//! [`Graph`]. Applying an operator wires new output variables to it; nothing
//! executes until [`Graph::forward`] walks the ancestors of a target in
//! topological order. [`Graph::backward`] then propagates gradients in
//! reverse, accumulating additively wherever branches rejoin.
//!
//! ```
//! use neurograd_core::{ops, Graph};
//!
//! let mut g = Graph::new();
//! let x = g.variable_from_data(&[2], vec![1.0, 2.0], true).unwrap();
//! let y = ops::mul(&mut g, x, x).unwrap();
//! let loss = ops::sum(&mut g, y).unwrap();
//! g.forward(loss, false).unwrap();
//! g.backward(loss, None).unwrap();
//! assert_eq!(g.grad(x).unwrap(), vec![2.0, 4.0]);
//! ```

pub mod buffer;
pub mod error;
pub mod function;
pub mod grad_check;
pub mod graph;
pub mod ops;
pub mod param;
pub mod types;
pub mod variable;

pub use buffer::{ArrayView, ArrayViewMut, TensorBuffer};
pub use error::NeuroGradError;
pub use function::{DoubleBackwardGrads, FunctionId, Operator};
pub use grad_check::{check_double_backward, check_grad, GradCheckError};
pub use graph::Graph;
pub use param::{
    ArrayInitializer, ConstantInitializer, Initializer, NormalInitializer,
    ParameterRegistry, UniformInitializer,
};
pub use types::DType;
pub use variable::VariableId;
