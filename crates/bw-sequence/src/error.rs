//! Sequence error types

use bw_core::SampleCount;
use bw_store::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Range [{start}, {start} + {len}) is outside the sequence (length {num_samples})")]
    OutOfRange {
        start: SampleCount,
        len: SampleCount,
        num_samples: SampleCount,
    },

    #[error("Buffer holds {got} samples but {needed} were requested")]
    BufferTooShort { needed: SampleCount, got: SampleCount },

    #[error("Internal error in {operation}: {detail}")]
    Inconsistent { operation: String, detail: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SequenceResult<T> = Result<T, SequenceError>;
