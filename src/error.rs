use std::io;

use thiserror::Error;

/// Unified error type for table construction and read-back.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from file create/write/sync/close/remove/read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Data corruption detected (CRC mismatch, bad format, truncated file).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// A caller broke an ordering or lifecycle contract.
    #[error("Precondition violated: {0}")]
    Precondition(String),
    /// Rejected configuration.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

// Iterators hand out their stored status on every call, so the error has to
// be clonable. io::Error isn't; keep its kind and message.
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            Error::Corruption(msg) => Error::Corruption(msg.clone()),
            Error::Precondition(msg) => Error::Precondition(msg.clone()),
            Error::InvalidArgument(msg) => Error::InvalidArgument(msg.clone()),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
