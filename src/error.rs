//! Error types for the columnstore.

use std::io;
use thiserror::Error;

/// Result type alias for columnstore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for columnstore operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from stream create/open/read/write/seek.
    #[error("I/O error: {0}")]
    Io(String),

    /// Data corruption detected.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid or unsupported on-disk structure.
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// CRC checksum mismatch.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Compression algorithm is not known to this build.
    #[error("Unknown compression: {0}")]
    UnknownCompression(String),

    /// Encrypted data found but no cipher is available.
    #[error("Missing cipher: {0}")]
    MissingCipher(String),

    /// Encryption collaborator failure.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Value is too large to be represented on disk.
    #[error("Value too large: {size} bytes (max: {max})")]
    Capacity { size: usize, max: usize },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Writer used outside of a prepared flush.
    #[error("Writer is not prepared")]
    NotPrepared,

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create an I/O error from a message.
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Error::Io(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this error means the on-disk structure is unreadable.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::Corruption(_)
                | Error::InvalidFormat(_)
                | Error::CrcMismatch { .. }
                | Error::UnknownCompression(_)
                | Error::MissingCipher(_)
        )
    }

    /// Check if this error came from the underlying storage.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
