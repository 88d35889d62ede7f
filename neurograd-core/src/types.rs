/// Data types supported by tensor buffers.
///
/// Operators currently compute in `F32`; `F64` buffers can be stored and
/// read back but are rejected by operator kernels with `DTypeMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Returns the size in bytes of one element of this data type.
    pub fn size_of(&self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F64 => std::mem::size_of::<f64>(),
        }
    }
}
