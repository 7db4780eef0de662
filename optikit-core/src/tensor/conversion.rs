use crate::device::StorageDevice;
use crate::error::OptikitError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;

impl Tensor {
    /// Returns a copy of this tensor placed on `device` with precision `dtype`.
    ///
    /// Values are preserved up to the target precision. The result is always
    /// a new leaf tensor with its own storage, even when nothing changes.
    pub fn to(&self, device: StorageDevice, dtype: DType) -> Result<Tensor, OptikitError> {
        let guard = self.read_data();
        log::trace!(
            "Converting tensor {:?} from {}/{} to {}/{}",
            guard.shape,
            guard.device,
            guard.dtype(),
            device,
            dtype
        );
        Ok(Tensor::from_data(TensorData {
            buffer: guard.buffer.cast(dtype),
            device,
            shape: guard.shape.clone(),
            requires_grad: false,
            grad: None,
            grad_fn: None,
        }))
    }

    pub fn to_device(&self, device: StorageDevice) -> Result<Tensor, OptikitError> {
        self.to(device, self.dtype())
    }

    pub fn to_dtype(&self, dtype: DType) -> Result<Tensor, OptikitError> {
        self.to(self.device(), dtype)
    }

    /// Moves this tensor to `device`/`dtype` in place, replacing its storage.
    ///
    /// The handle keeps its identity, so every holder of it observes the
    /// move. The gradient, if any, is moved along.
    pub fn set_placement_(&self, device: StorageDevice, dtype: DType) -> Result<(), OptikitError> {
        let grad = self.grad();
        {
            let mut guard = self.write_data();
            let converted = guard.buffer.cast(dtype);
            guard.buffer = converted;
            guard.device = device;
        }
        if let Some(g) = grad {
            g.set_placement_(device, dtype)?;
        }
        Ok(())
    }

    /// True if both tensors live on the same device with the same dtype.
    pub fn same_placement(&self, other: &Tensor) -> bool {
        if Tensor::ptr_eq(self, other) {
            return true;
        }
        self.device() == other.device() && self.dtype() == other.dtype()
    }
}
