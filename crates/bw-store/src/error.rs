//! Block storage error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not create block file {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The block file named {0} is missing from the project")]
    MissingBlockFile(String),

    #[error("Aliased source file is missing: {0}")]
    AliasSourceMissing(PathBuf),

    #[error("Invalid block file {name}: {reason}")]
    InvalidBlockFile { name: String, reason: String },

    #[error("Read of {len} samples at {start} exceeds block length {block_len}")]
    OutOfBounds {
        start: usize,
        len: usize,
        block_len: usize,
    },

    #[error("Project directory error: {0}")]
    ProjectDir(String),

    #[error("Block data not available yet: {0}")]
    DataNotAvailable(String),

    #[error("WAV error: {0}")]
    Wav(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<hound::Error> for StorageError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => StorageError::Io(e),
            other => StorageError::Wav(other.to_string()),
        }
    }
}
