//! CLI error types with exit code handling
//!
//! Library errors are folded into a single diagnostic type whose variant
//! decides the process exit code.

use miette::Diagnostic;
use rigging_core::CoreError;
use rigging_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid input (inventory, values, playbook, filter)
    #[error("Validation failed: {message}")]
    #[diagnostic(code(rigging::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Group-vars or playbook evaluation failed
    #[error("Evaluation failed: {message}")]
    #[diagnostic(code(rigging::cli::template))]
    Template { message: String },

    /// Kubeconfig could not be fetched or decrypted
    #[error("Kubeconfig error: {message}")]
    #[diagnostic(code(rigging::cli::kubeconfig))]
    Kubeconfig {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(rigging::cli::io))]
    Io { message: String },

    /// Output could not be written or serialized
    #[error("{message}")]
    #[diagnostic(code(rigging::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Kubeconfig { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other {
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { .. } | CoreError::Read { .. } | CoreError::Io(_) => {
                CliError::Io { message }
            }
            CoreError::Evaluator { .. } => CliError::Template { message },
            CoreError::Serialization { .. } => CliError::Other { message },
            CoreError::Parse { .. }
            | CoreError::Ejson { .. }
            | CoreError::InvalidPlaybook { .. } => CliError::validation(message),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err.root() {
            KubeError::NotFound { .. } | KubeError::Io(_) => CliError::Io { message },
            KubeError::EntryNotFound { .. } => CliError::validation_with_help(
                message,
                "run `rigging inventory list` to see the available entries",
            ),
            KubeError::InvalidPattern { .. }
            | KubeError::InvalidInventory { .. }
            | KubeError::InvalidParameter { .. }
            | KubeError::UnsupportedLoaderType { .. } => CliError::validation(message),
            KubeError::Decryption { .. } | KubeError::Archive { .. } => CliError::Kubeconfig {
                message,
                help: Some("check the entry's decrypt_key or EJSON_PRIVKEY".to_string()),
            },
            _ => CliError::Kubeconfig {
                message,
                help: None,
            },
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::other(format!("Failed to serialize output: {err}"))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
