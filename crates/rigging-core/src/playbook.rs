//! Playbook model
//!
//! A playbook is a templated YAML document with a top-level `plays` list.
//! It is merged on top of an entry's compiled values and evaluated against
//! the result, so plays can reference anything from group-vars. The compiled
//! values are context only and are not rendered again.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};
use crate::evaluate::{EvalScope, Evaluator};
use crate::value_file::evaluator_error;
use crate::values::Values;

/// Helm repository referenced by a play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub url: String,
}

/// One chart release to deploy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub name: String,
    pub chart: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<Repo>,

    #[serde(default)]
    pub values: Values,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Playbook {
    pub plays: Vec<Play>,
}

impl Playbook {
    /// Load a playbook against compiled values
    pub fn load(
        path: impl AsRef<Path>,
        values: &Values,
        evaluator: &dyn Evaluator,
        skip_eval: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CoreError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CoreError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let document = Values::from_yaml(&content).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let tree = if skip_eval {
            let mut tree = values.clone();
            tree.merge(&document);
            tree
        } else {
            evaluator
                .evaluate_with(document, values, EvalScope::Merged)
                .map_err(|e| evaluator_error(path.display().to_string(), e.as_ref()))?
        };

        Self::from_tree(path, tree)
    }

    fn from_tree(path: &Path, tree: Values) -> Result<Self> {
        let invalid = |message: String| CoreError::InvalidPlaybook {
            path: PathBuf::from(path),
            message,
        };

        let plays = match tree.into_inner() {
            JsonValue::Object(mut map) => map
                .remove("plays")
                .ok_or_else(|| invalid("missing `plays` key".to_string()))?,
            _ => return Err(invalid("document root must be a mapping".to_string())),
        };

        let plays: Vec<Play> =
            serde_json::from_value(plays).map_err(|e| invalid(e.to_string()))?;

        Ok(Self { plays })
    }
}
