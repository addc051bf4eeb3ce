//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize values: {message}")]
    Serialization { message: String },

    #[error("Failed to evaluate {source_name}: {message}")]
    Evaluator { source_name: String, message: String },

    #[error("EJSON decryption failed: {message}")]
    Ejson { message: String },

    #[error("Invalid playbook {}: {message}", path.display())]
    InvalidPlaybook { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn ejson(message: impl Into<String>) -> Self {
        Self::Ejson {
            message: message.into(),
        }
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
