//! Error types for encrypted environment operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for encrypted environment operations.
pub type EnvResult<T> = Result<T, EnvError>;

/// Which direction a block cipher call was running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOp {
    /// Plaintext to ciphertext.
    Encrypt,
    /// Ciphertext to plaintext.
    Decrypt,
}

impl std::fmt::Display for CipherOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Errors that can occur while reading, writing or managing encrypted files.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An I/O error occurred on a data file or a sidecar file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The block cipher rejected a block.
    ///
    /// This is the only way a cipher reports failure, e.g. an
    /// authentication tag mismatch.
    #[error("block {block_index} corrupted: {operation} callback failed")]
    Corruption {
        /// Index of the block that failed.
        block_index: u64,
        /// The cipher operation that failed.
        operation: CipherOp,
    },

    /// Attempted to read beyond the end of an in-memory file.
    #[error("read beyond end of file: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current file size.
        size: u64,
    },

    /// A path does not exist in the file system.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The environment or cipher descriptor was configured incorrectly.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A caller passed a buffer or index the operation cannot accept.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl EnvError {
    /// Creates a corruption error for a failed cipher callback.
    pub fn corruption(block_index: u64, operation: CipherOp) -> Self {
        Self::Corruption {
            block_index,
            operation,
        }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if this error came from a cipher callback.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }

    /// Returns true if this error means the path is absent.
    ///
    /// Covers both the in-memory [`EnvError::NotFound`] variant and OS
    /// errors of kind [`io::ErrorKind::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
