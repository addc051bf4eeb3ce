//! A single group-vars file, loaded, decrypted and evaluated

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::context::SecretContext;
use crate::ejson;
use crate::error::{CoreError, Result};
use crate::evaluate::{EvalScope, Evaluator};
use crate::values::Values;

/// Extension that marks a file as EJSON
pub const EJSON_EXTENSION: &str = "ejson";

/// How the file content was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// Not an EJSON file, or decryption was skipped
    Plain,

    /// EJSON secrets were opened
    Decrypted,

    /// Decryption failed; the raw content was used instead
    Fallback { warning: String },
}

impl Decryption {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Fallback { warning } => Some(warning),
            _ => None,
        }
    }
}

/// One configuration fragment
#[derive(Debug, Clone)]
pub struct ValueFile {
    path: PathBuf,
    tree: Values,
    skip_eval: bool,
    decryption: Decryption,
}

impl ValueFile {
    /// Read, decrypt, parse and evaluate a value file
    pub fn load(
        path: impl AsRef<Path>,
        skip_eval: bool,
        secrets: &SecretContext,
        evaluator: &dyn Evaluator,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = std::fs::read(path).map_err(|source| CoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (content, decryption) = if is_ejson(path) && !secrets.skip_decrypt {
            match ejson::decrypt(&raw, &secrets.key_dir, secrets.private_key.as_deref()) {
                Ok(plain) => (plain, Decryption::Decrypted),
                Err(e) => {
                    let warning = e.to_string();
                    tracing::warn!(
                        path = %path.display(),
                        "{warning}; using file content as-is"
                    );
                    (raw, Decryption::Fallback { warning })
                }
            }
        } else {
            (raw, Decryption::Plain)
        };

        let mut tree = parse_tree(path, &content)?;

        if !skip_eval {
            tree = evaluator
                .evaluate(tree, EvalScope::Fragment)
                .map_err(|e| evaluator_error(path.display().to_string(), e.as_ref()))?;
        }

        tracing::debug!(path = %path.display(), ?decryption, "loaded value file");

        Ok(Self {
            path: path.to_path_buf(),
            tree,
            skip_eval,
            decryption,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed tree
    pub fn raw(&self) -> &Values {
        &self.tree
    }

    /// Top-level key to value mapping
    pub fn map(&self) -> serde_json::Map<String, JsonValue> {
        self.tree.as_map().cloned().unwrap_or_default()
    }

    pub fn skip_eval(&self) -> bool {
        self.skip_eval
    }

    pub fn decryption(&self) -> &Decryption {
        &self.decryption
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.tree.to_yaml()
    }

    pub fn to_json(&self) -> Result<String> {
        self.tree.to_json()
    }

    pub fn into_values(self) -> Values {
        self.tree
    }
}

fn is_ejson(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(EJSON_EXTENSION)
}

/// Parse YAML (or JSON) into a map-rooted tree
fn parse_tree(path: &Path, content: &[u8]) -> Result<Values> {
    let text = std::str::from_utf8(content).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {e}"),
    })?;

    if text.trim().is_empty() {
        return Ok(Values::new());
    }

    let value = Values::from_yaml(text)
        .map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .into_inner();

    match value {
        JsonValue::Object(_) => Ok(Values(value)),
        JsonValue::Null => Ok(Values::new()),
        other => Err(CoreError::Parse {
            path: path.to_path_buf(),
            message: format!("expected a mapping at the document root, found {}", kind(&other)),
        }),
    }
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Build an evaluator error with terminal escapes removed
pub(crate) fn evaluator_error(
    source_name: String,
    err: &(dyn std::error::Error + Send + Sync),
) -> CoreError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    CoreError::Evaluator {
        source_name,
        message: console::strip_ansi_codes(&message).into_owned(),
    }
}
