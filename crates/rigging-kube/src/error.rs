//! Error types for rigging-kube

use std::path::PathBuf;

use thiserror::Error;

/// Result type for rigging-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while resolving kubeconfigs
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubeconfig source file does not exist
    #[error("kubeconfig source '{}' not found", path.display())]
    NotFound { path: PathBuf },

    /// Inventory has no entry with this name
    #[error("inventory entry '{name}' not found")]
    EntryNotFound { name: String },

    /// Content matched a known, unsupported binary signature
    #[error("unrecognized content format ({signature})")]
    UnrecognizedFormat { signature: String },

    /// Kubeconfig source file is of an unsupported type
    #[error("unknown kubeconfig source file type for '{}': {signature}", path.display())]
    UnknownSourceType { path: PathBuf, signature: String },

    /// Entry names a loader backend that doesn't exist
    #[error("unsupported kubeconfig loader type '{kind}' (expected one of: file, s3)")]
    UnsupportedLoaderType { kind: String },

    /// Archive could not be opened or read
    #[error("failed to extract archive: {message}\nHint: check the decryption key")]
    Archive { message: String },

    /// Archive holds more than one file
    #[error("archive contains {count} files, expected exactly one")]
    MultipleEntries { count: usize },

    /// Encrypted stream could not be decrypted
    #[error("decryption failed: {message}\nHint: check the decryption key")]
    Decryption { message: String },

    /// Object could not be fetched from storage
    #[error("failed to download s3://{bucket}/{key}: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    /// Entry filter is not a valid regular expression
    #[error("invalid entry filter '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Loader parameter has an unusable value
    #[error("invalid loader parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// Inventory definition could not be parsed
    #[error("invalid inventory {}: {message}", path.display())]
    InvalidInventory { path: PathBuf, message: String },

    /// Loaded bytes are not a kubeconfig document
    #[error("invalid kubeconfig: {message}")]
    InvalidKubeconfig { message: String },

    /// Failure scoped to one inventory entry
    #[error("entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: Box<KubeError>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubeError {
    pub(crate) fn archive(message: impl std::fmt::Display) -> Self {
        Self::Archive {
            message: message.to_string(),
        }
    }

    pub(crate) fn decryption(message: impl std::fmt::Display) -> Self {
        Self::Decryption {
            message: message.to_string(),
        }
    }

    pub(crate) fn download(bucket: &str, key: &str, message: impl std::fmt::Display) -> Self {
        Self::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Attach the entry name to an error
    pub fn for_entry(self, name: &str) -> Self {
        match self {
            already @ Self::Entry { .. } => already,
            other => Self::Entry {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Error with any entry wrapping removed
    pub fn root(&self) -> &KubeError {
        match self {
            Self::Entry { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::NotFound { .. } | Self::EntryNotFound { .. }
        )
    }
}
