use rand::thread_rng;
use rand_distr::{Distribution, Normal};

use crate::buffer::Buffer;
use crate::device::StorageDevice;
use crate::error::OptikitError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Creates a new F32 tensor filled with zeros on the CPU.
pub fn zeros(shape: &[usize]) -> Result<Tensor, OptikitError> {
    full(shape, 0.0)
}

/// Creates a new F64 tensor filled with zeros on the CPU.
pub fn zeros_f64(shape: &[usize]) -> Result<Tensor, OptikitError> {
    full_f64(shape, 0.0)
}

/// Creates a new F32 tensor filled with `value` on the CPU.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, OptikitError> {
    let numel = shape.iter().product();
    Tensor::new(vec![value; numel], shape.to_vec())
}

/// Creates a new F64 tensor filled with `value` on the CPU.
pub fn full_f64(shape: &[usize], value: f64) -> Result<Tensor, OptikitError> {
    let numel = shape.iter().product();
    Tensor::new_f64(vec![value; numel], shape.to_vec())
}

/// Creates a zero-filled leaf tensor with the shape, device and dtype of `tensor`.
pub fn zeros_like(tensor: &Tensor) -> Result<Tensor, OptikitError> {
    let guard = tensor.read_data();
    Tensor::from_buffer(
        Buffer::zeros(guard.dtype(), guard.numel()),
        guard.shape.clone(),
        guard.device,
    )
}

/// Creates a tensor with elements drawn from the standard normal distribution.
pub fn randn(shape: &[usize], dtype: DType) -> Result<Tensor, OptikitError> {
    let numel: usize = shape.iter().product();
    let normal = Normal::new(0.0, 1.0).map_err(|e| {
        OptikitError::UnsupportedOperation(format!("normal distribution: {}", e))
    })?;
    let mut rng = thread_rng();
    let values: Vec<f64> = (0..numel).map(|_| normal.sample(&mut rng)).collect();
    Tensor::from_buffer(Buffer::from_f64(dtype, &values), shape.to_vec(), StorageDevice::CPU)
}
