use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::Buffer;
use crate::device::StorageDevice;
use crate::error::OptikitError;
use crate::tensor_data::TensorData;
use crate::types::DType;

mod autograd_methods;
pub mod create;
mod conversion;
mod debug;
mod inplace_arithmetic_methods;

#[cfg(test)]
mod autograd_methods_test;

pub use create::{full, full_f64, randn, zeros, zeros_f64, zeros_like};

/// Stable identity of a tensor handle. Clones of a `Tensor` share it.
pub type TensorId = usize;

/// Represents a multi-dimensional array (tensor).
///
/// `Tensor` uses `Arc<RwLock<TensorData>>` internally:
/// 1.  **Shared Ownership:** clones are cheap and point to the same data,
///     gradient and graph node. Identity is by handle, never by value.
/// 2.  **Interior Mutability:** buffers and autograd metadata can be
///     modified in place through a shared `&Tensor`.
pub struct Tensor {
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Clone for Tensor {
    /// Shallow clone: the new handle refers to the same tensor.
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

impl Tensor {
    /// Creates a new leaf Tensor with the given f32 data and shape on the CPU.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, OptikitError> {
        Self::from_buffer(Buffer::F32(data_vec), shape, StorageDevice::CPU)
    }

    /// Creates a new leaf Tensor with the given f64 data and shape on the CPU.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, OptikitError> {
        Self::from_buffer(Buffer::F64(data_vec), shape, StorageDevice::CPU)
    }

    /// Creates a scalar (0-dimensional) tensor of the given dtype.
    pub fn scalar(value: f64, dtype: DType) -> Self {
        Tensor::from_data(TensorData {
            buffer: Buffer::from_f64(dtype, &[value]),
            device: StorageDevice::CPU,
            shape: vec![],
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    pub fn from_buffer(
        buffer: Buffer,
        shape: Vec<usize>,
        device: StorageDevice,
    ) -> Result<Self, OptikitError> {
        Ok(Tensor::from_data(TensorData::from_buffer(buffer, shape, device)?))
    }

    pub(crate) fn from_data(data: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Acquires a read lock on the tensor's data.
    ///
    /// A poisoned lock is recovered: the data itself is never left half
    /// written by the operations of this crate.
    pub fn read_data(&self) -> RwLockReadGuard<'_, TensorData> {
        self.data.read().unwrap_or_else(|poisoned| {
            log::warn!("RwLock for tensor data was poisoned on read. Recovering.");
            poisoned.into_inner()
        })
    }

    /// Acquires a write lock on the tensor's data.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, TensorData> {
        self.data.write().unwrap_or_else(|poisoned| {
            log::warn!("RwLock for tensor data was poisoned on write. Recovering.");
            poisoned.into_inner()
        })
    }

    pub fn dtype(&self) -> DType {
        self.read_data().dtype()
    }

    pub fn device(&self) -> StorageDevice {
        self.read_data().device
    }

    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// Identity of this handle.
    pub fn id(&self) -> TensorId {
        Arc::as_ptr(&self.data) as *const () as usize
    }

    /// True if both handles refer to the same tensor.
    pub fn ptr_eq(a: &Tensor, b: &Tensor) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    /// Address of the element storage, to observe reallocation.
    pub fn storage_addr(&self) -> usize {
        self.read_data().buffer.storage_addr()
    }

    /// Copies the elements out as `f64`, whatever the dtype.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.read_data().buffer.to_f64_vec()
    }

    /// Returns the data as `Vec<f32>`. Fails unless the tensor is `F32`.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, OptikitError> {
        match &self.read_data().buffer {
            Buffer::F32(v) => Ok(v.clone()),
            other => Err(OptikitError::DataTypeMismatch {
                expected: DType::F32,
                actual: other.dtype(),
                operation: "get_f32_data".to_string(),
            }),
        }
    }

    /// Returns the data as `Vec<f64>`. Fails unless the tensor is `F64`.
    pub fn get_f64_data(&self) -> Result<Vec<f64>, OptikitError> {
        match &self.read_data().buffer {
            Buffer::F64(v) => Ok(v.clone()),
            other => Err(OptikitError::DataTypeMismatch {
                expected: DType::F64,
                actual: other.dtype(),
                operation: "get_f64_data".to_string(),
            }),
        }
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<f64, OptikitError> {
        let guard = self.read_data();
        if guard.numel() != 1 {
            return Err(OptikitError::NotAScalar("item".to_string()));
        }
        Ok(guard.buffer.to_f64_vec()[0])
    }
}
