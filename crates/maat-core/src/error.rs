//! Error types for MA'AT
//!
//! Short or empty series are not errors: the numeric kernels resolve them
//! to fixed fallback values. SCRAM is a cycle status, not an error.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed ledger line {line} in {}: {message}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("hash mismatch at line {line} in {}: expected {expected}, found {found}", path.display())]
    HashMismatch {
        path: PathBuf,
        line: usize,
        expected: String,
        found: String,
    },

    #[error("record is not a JSON object: {0}")]
    InvalidRecord(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn format(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for errors raised while reading a ledger back.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
