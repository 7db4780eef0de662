use std::fmt;

/// Represents the physical location where tensor data is stored.
///
/// The reference runtime keeps every buffer in host memory; the device is a
/// placement tag. Operations still require their operands to share a device,
/// and moving between devices goes through [`Tensor::to`](crate::Tensor::to),
/// which always copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageDevice {
    /// Main system memory. This is the default device.
    #[default]
    CPU,
    /// An accelerator, identified by its ordinal.
    GPU(usize),
}

impl fmt::Display for StorageDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageDevice::CPU => write!(f, "cpu"),
            StorageDevice::GPU(ordinal) => write!(f, "gpu:{}", ordinal),
        }
    }
}
