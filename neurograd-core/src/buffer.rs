// neurograd-core/src/buffer.rs

use crate::error::NeuroGradError;
use crate::types::DType;
use num_traits::Zero;

/// Typed, contiguous storage for one plane of a tensor buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Storage {
    fn zeros(dtype: DType, numel: usize) -> Storage {
        match dtype {
            DType::F32 => Storage::F32(zeros_vec::<f32>(numel)),
            DType::F64 => Storage::F64(zeros_vec::<f64>(numel)),
        }
    }

    fn len(&self) -> usize {
        match self {
            Storage::F32(v) => v.len(),
            Storage::F64(v) => v.len(),
        }
    }
}

fn zeros_vec<T: Zero + Clone>(numel: usize) -> Vec<T> {
    vec![T::zero(); numel]
}

/// An N-dimensional numeric array holding two logical planes: data and grad.
///
/// Both planes are allocated lazily (zero-filled) on first mutable access and
/// may be released with `clear_data` / `clear_grad` to bound peak memory.
/// Reading a plane that is not currently allocated fails with `UseAfterClear`.
///
/// Invariant: an allocated grad plane always has the same number of elements
/// as the data plane would (`numel()`), since both share `shape`.
#[derive(Debug)]
pub struct TensorBuffer {
    shape: Vec<usize>,
    dtype: DType,
    data: Option<Storage>,
    grad: Option<Storage>,
}

/// Read-only view over one plane of a buffer, handed to operator kernels.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a> {
    pub shape: &'a [usize],
    pub data: &'a [f32],
}

/// Mutable view over the data plane of a buffer, handed to operator kernels.
#[derive(Debug)]
pub struct ArrayViewMut<'a> {
    pub shape: &'a [usize],
    pub data: &'a mut [f32],
}

impl TensorBuffer {
    /// Creates an unallocated buffer with the given shape and dtype.
    pub fn new(shape: Vec<usize>, dtype: DType) -> Self {
        TensorBuffer {
            shape,
            dtype,
            data: None,
            grad: None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements implied by the shape. The product of an empty
    /// shape is 1 (a scalar).
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Replaces the shape, dropping any stale planes if the element count
    /// changes. Used by the executor when output shapes become known at
    /// forward time.
    pub(crate) fn reshape(&mut self, shape: Vec<usize>) {
        let new_numel: usize = shape.iter().product();
        if new_numel != self.numel() {
            self.data = None;
            self.grad = None;
        }
        self.shape = shape;
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_grad(&self) -> bool {
        self.grad.is_some()
    }

    fn expect_f32<'a>(
        storage: &'a Option<Storage>,
        dtype: DType,
        what: &str,
    ) -> Result<&'a [f32], NeuroGradError> {
        match storage {
            Some(Storage::F32(v)) => Ok(v.as_slice()),
            Some(Storage::F64(_)) => Err(NeuroGradError::DTypeMismatch {
                expected: DType::F32,
                actual: dtype,
                operation: what.to_string(),
            }),
            None => Err(NeuroGradError::UseAfterClear {
                what: what.to_string(),
            }),
        }
    }

    /// Read-only access to the data plane.
    pub fn data_f32(&self) -> Result<&[f32], NeuroGradError> {
        Self::expect_f32(&self.data, self.dtype, "data plane (f32)")
    }

    /// Read-only access to the grad plane.
    pub fn grad_f32(&self) -> Result<&[f32], NeuroGradError> {
        Self::expect_f32(&self.grad, self.dtype, "grad plane (f32)")
    }

    /// Mutable access to the data plane, zero-allocating it if absent.
    pub fn data_f32_mut(&mut self) -> Result<&mut [f32], NeuroGradError> {
        self.plane_f32_mut(true)
    }

    /// Mutable access to the grad plane, zero-allocating it if absent.
    pub fn grad_f32_mut(&mut self) -> Result<&mut [f32], NeuroGradError> {
        self.plane_f32_mut(false)
    }

    fn plane_f32_mut(&mut self, data_plane: bool) -> Result<&mut [f32], NeuroGradError> {
        if self.dtype != DType::F32 {
            return Err(NeuroGradError::DTypeMismatch {
                expected: DType::F32,
                actual: self.dtype,
                operation: "mutable plane access (f32)".to_string(),
            });
        }
        let numel = self.numel();
        let slot = if data_plane { &mut self.data } else { &mut self.grad };
        let storage = slot.get_or_insert_with(|| Storage::zeros(DType::F32, numel));
        match storage {
            Storage::F32(v) => Ok(v.as_mut_slice()),
            Storage::F64(_) => Err(NeuroGradError::InternalError(
                "f64 storage in an f32 buffer".to_string(),
            )),
        }
    }

    /// Replaces the data plane, checking the element count against the shape.
    pub fn set_data_f32(&mut self, values: Vec<f32>) -> Result<(), NeuroGradError> {
        if self.dtype != DType::F32 {
            return Err(NeuroGradError::DTypeMismatch {
                expected: DType::F32,
                actual: self.dtype,
                operation: "set_data_f32".to_string(),
            });
        }
        if values.len() != self.numel() {
            return Err(NeuroGradError::TensorCreationError {
                data_len: values.len(),
                shape: self.shape.clone(),
            });
        }
        self.data = Some(Storage::F32(values));
        Ok(())
    }

    /// Replaces the data plane with f64 values.
    pub fn set_data_f64(&mut self, values: Vec<f64>) -> Result<(), NeuroGradError> {
        if self.dtype != DType::F64 {
            return Err(NeuroGradError::DTypeMismatch {
                expected: DType::F64,
                actual: self.dtype,
                operation: "set_data_f64".to_string(),
            });
        }
        if values.len() != self.numel() {
            return Err(NeuroGradError::TensorCreationError {
                data_len: values.len(),
                shape: self.shape.clone(),
            });
        }
        self.data = Some(Storage::F64(values));
        Ok(())
    }

    /// Read-only access to an f64 data plane.
    pub fn data_f64(&self) -> Result<&[f64], NeuroGradError> {
        match &self.data {
            Some(Storage::F64(v)) => Ok(v.as_slice()),
            Some(Storage::F32(_)) => Err(NeuroGradError::DTypeMismatch {
                expected: DType::F64,
                actual: self.dtype,
                operation: "data plane (f64)".to_string(),
            }),
            None => Err(NeuroGradError::UseAfterClear {
                what: "data plane (f64)".to_string(),
            }),
        }
    }

    /// Releases the data plane. Reading it again without reallocation fails
    /// with `UseAfterClear`.
    pub fn clear_data(&mut self) {
        self.data = None;
    }

    /// Releases the grad plane.
    pub fn clear_grad(&mut self) {
        self.grad = None;
    }

    /// Adds `values` element-wise into the grad plane, zero-allocating it if
    /// absent. This is the only way gradients enter a buffer: accumulation is
    /// always additive so multiple consumers of the same variable compose per
    /// the multivariate chain rule.
    pub fn accumulate_grad(&mut self, values: &[f32]) -> Result<(), NeuroGradError> {
        if values.len() != self.numel() {
            return Err(NeuroGradError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: vec![values.len()],
                operation: "accumulate_grad".to_string(),
            });
        }
        let grad = self.grad_f32_mut()?;
        for (g, v) in grad.iter_mut().zip(values.iter()) {
            *g += v;
        }
        Ok(())
    }

    /// Read-only view over shape and data plane.
    pub fn view(&self) -> Result<ArrayView<'_>, NeuroGradError> {
        Ok(ArrayView {
            shape: &self.shape,
            data: Self::expect_f32(&self.data, self.dtype, "data plane (f32)")?,
        })
    }

    /// Read-only view over shape and grad plane.
    pub fn grad_view(&self) -> Result<ArrayView<'_>, NeuroGradError> {
        Ok(ArrayView {
            shape: &self.shape,
            data: Self::expect_f32(&self.grad, self.dtype, "grad plane (f32)")?,
        })
    }

    /// Mutable view over the data plane, allocating it if needed.
    pub fn view_mut(&mut self) -> Result<ArrayViewMut<'_>, NeuroGradError> {
        if self.dtype != DType::F32 {
            return Err(NeuroGradError::DTypeMismatch {
                expected: DType::F32,
                actual: self.dtype,
                operation: "view_mut".to_string(),
            });
        }
        let numel = self.numel();
        let storage = self
            .data
            .get_or_insert_with(|| Storage::zeros(DType::F32, numel));
        match storage {
            Storage::F32(v) => Ok(ArrayViewMut {
                shape: &self.shape,
                data: v.as_mut_slice(),
            }),
            Storage::F64(_) => Err(NeuroGradError::InternalError(
                "f64 storage in an f32 buffer".to_string(),
            )),
        }
    }

    /// Sanity check used in debug paths: allocated planes match the shape.
    pub(crate) fn planes_consistent(&self) -> bool {
        let numel = self.numel();
        self.data.as_ref().map_or(true, |s| s.len() == numel)
            && self.grad.as_ref().map_or(true, |s| s.len() == numel)
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
