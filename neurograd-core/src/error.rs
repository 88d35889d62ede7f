use crate::types::DType;
use thiserror::Error;

/// Custom error type for the NeuroGrad framework.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum NeuroGradError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Arity mismatch: operation {operation} declares {expected} slots, got {actual}")]
    ArityMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("Data type mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    DTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Domain error in operation {operation}: {message}")]
    DomainError { operation: String, message: String },

    /// An operator lacks the requested capability (backward or double_backward).
    /// This is an expected terminal condition for forward-only operators and
    /// must propagate unchanged — never substituted with a zero gradient.
    #[error("Operation {operation} does not implement {capability}")]
    NotImplemented {
        operation: String,
        capability: String,
    },

    #[error("Buffer accessed after being cleared or before allocation: {what}")]
    UseAfterClear { what: String },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Internal error: {0}")]
    InternalError(String),
}
