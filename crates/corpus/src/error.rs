use std::path::PathBuf;
use thiserror::Error;

/// Result type for corpus operations
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Errors that can occur while loading chunk records
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The record store is missing or cannot be listed
    #[error("Corpus unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// A single record file could not be read or parsed
    #[error("Malformed record {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },
}

impl CorpusError {
    /// Create an unavailable-store error
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-record error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
