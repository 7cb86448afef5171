#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PakError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no files to attach under {}", .0.display())]
    EmptySource(PathBuf),

    #[error("copying base file {} failed: {source}", path.display())]
    BaseCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trailer hash mismatch: stored {stored}, computed {computed}")]
    Integrity { stored: String, computed: String },

    #[error("malformed trailer: {0}")]
    Malformed(String),

    #[error("path is outside input dir: {0}")]
    Outside(String),

    #[error("invalid: {0}")]
    Invalid(String),
}

pub type PakResult<T> = Result<T, PakError>;
