//! Buffer manager error types.

use crate::storage::page::{BufferKind, TrainId};
use thiserror::Error;

/// Errors that can occur in the buffer manager.
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    #[error("No unfixed buffer available in the {kind} pool")]
    NoUnfixedBuffer { kind: BufferKind },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash index inconsistency: {key} is not registered in the {kind} pool")]
    HashKeyNotFound { key: TrainId, kind: BufferKind },

    #[error("Duplicate key: {key} is already registered in the {kind} pool")]
    DuplicateKey { key: TrainId, kind: BufferKind },

    #[error("Train {key} is not resident in the {kind} pool")]
    TrainNotResident { key: TrainId, kind: BufferKind },

    #[error("Train {key} in the {kind} pool is not fixed")]
    NotFixed { key: TrainId, kind: BufferKind },

    #[error("{count} frames of the {kind} pool are still fixed")]
    FramesFixed { kind: BufferKind, count: usize },

    #[error("Train {key} does not exist on disk")]
    MissingOnDisk { key: TrainId },

    #[error("Invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },
}

impl BufferError {
    /// Whether the error means the allocation attempt cannot simply be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BufferError::Io(_) | BufferError::HashKeyNotFound { .. }
        )
    }
}

/// Result type for buffer manager operations.
pub type BufferResult<T> = Result<T, BufferError>;
