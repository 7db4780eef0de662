use crate::device::StorageDevice;
use crate::types::DType;
use thiserror::Error;

/// Error type of the optikit tensor runtime.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum OptikitError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Device mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DeviceMismatch {
        expected: StorageDevice,
        actual: StorageDevice,
        operation: String,
    },

    #[error("Data type mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DataTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Backward called on non-scalar tensor without explicit gradient.")]
    BackwardNonScalar,

    #[error("Backward error: {0}")]
    BackwardError(String),

    #[error("Operation '{0}' requires a scalar tensor")]
    NotAScalar(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}
