//! Reference tensor runtime used by `optikit-optim`.
//!
//! Provides the capabilities an optimizer needs from its tensors: identity
//! by handle, leaf classification, gradient attachment, in-place zeroing and
//! arithmetic, device/dtype queries and copying conversion, and
//! `zeros_like` allocation.

pub mod autograd;
pub mod buffer;
pub mod device;
pub mod error;
pub mod ops;
pub mod tensor;
pub mod tensor_data;
pub mod types;
pub mod utils;

pub use device::StorageDevice;
pub use error::OptikitError;
pub use tensor::{Tensor, TensorId};
pub use types::DType;
