use optikit_core::OptikitError;
use thiserror::Error;

/// Error type of the optimizer layer.
#[derive(Error, Debug)]
pub enum OptimError {
    /// Misuse detected at registration or construction time.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Tensor error: {0}")]
    Core(#[from] OptikitError),

    #[error("Serialization error (bincode): {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Missing key in archive: '{0}'")]
    MissingKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OptimError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        OptimError::InvalidArgument(message.into())
    }
}
