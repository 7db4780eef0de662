use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::device::StorageDevice;
use crate::error::OptikitError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Internal storage and metadata for a Tensor.
///
/// Wrapped in `Arc<RwLock<TensorData>>` by [`Tensor`], so every clone of a
/// tensor handle observes the same buffer, gradient and graph node.
#[derive(Debug)]
pub struct TensorData {
    /// Contiguous, row-major element storage.
    pub(crate) buffer: Buffer,
    /// Placement tag of the buffer.
    pub(crate) device: StorageDevice,
    pub(crate) shape: Vec<usize>,

    /// Whether operations on this tensor are recorded for differentiation.
    pub(crate) requires_grad: bool,
    /// Accumulated gradient; same shape, device and dtype as this tensor.
    pub(crate) grad: Option<Tensor>,
    /// The operation that produced this tensor. `None` for leaves.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp>>,
}

impl TensorData {
    /// Builds a leaf `TensorData` from a buffer, checking it against `shape`.
    pub fn from_buffer(
        buffer: Buffer,
        shape: Vec<usize>,
        device: StorageDevice,
    ) -> Result<Self, OptikitError> {
        let numel: usize = shape.iter().product();
        if buffer.len() != numel {
            return Err(OptikitError::TensorCreationError {
                data_len: buffer.len(),
                shape,
            });
        }
        Ok(TensorData {
            buffer,
            device,
            shape,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    pub fn numel(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none()
    }
}
