//! Local file kubeconfig loader

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rigging_core::{EnvDefaults, SecretContext};

use super::{KubeconfigLoader, LoaderParams, default_decrypt_key};
use crate::archive::extract_single_file_archive;
use crate::classify::{ContentType, classify_file};
use crate::crypto::decrypt_symmetric_file;
use crate::error::{KubeError, Result};

/// Default kubeconfig path, relative to the working directory
pub const DEFAULT_PATH: &str = "kubeconfig";

const KNOWN_PARAMS: &[&str] = &["path", "decryptkey"];

/// Loads a kubeconfig from a local file
///
/// The file may be plaintext, a password-protected 7z archive or an OpenSSL
/// encrypted stream; the format is detected from its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoader {
    path: PathBuf,
    decrypt_key: String,
}

impl FileLoader {
    pub fn new(path: impl Into<PathBuf>, decrypt_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            decrypt_key: decrypt_key.into(),
        }
    }

    /// Build from inventory parameters
    ///
    /// `path` defaults to `kubeconfig`, `decryptkey` to the secret context's
    /// private key and then `EJSON_PRIVKEY`.
    pub fn from_params(params: &LoaderParams, secrets: &SecretContext, env: &EnvDefaults) -> Self {
        params.log_unknown("file", KNOWN_PARAMS);

        let path = params.get("path").unwrap_or(DEFAULT_PATH);
        let decrypt_key = params
            .get("decryptkey")
            .or_else(|| default_decrypt_key(secrets, env))
            .unwrap_or_default();

        Self::new(path, decrypt_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn decrypt_key(&self) -> &str {
        &self.decrypt_key
    }
}

#[async_trait]
impl KubeconfigLoader for FileLoader {
    async fn load(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            return Err(KubeError::NotFound {
                path: self.path.clone(),
            });
        }

        let content_type = classify_file(&self.path).map_err(|e| match e {
            KubeError::UnrecognizedFormat { signature } => KubeError::UnknownSourceType {
                path: self.path.clone(),
                signature,
            },
            other => other,
        })?;

        tracing::debug!(path = %self.path.display(), %content_type, "loading kubeconfig file");

        match content_type {
            ContentType::Plaintext => Ok(std::fs::read(&self.path)?),
            ContentType::EncryptedArchive => {
                extract_single_file_archive(&self.path, &self.decrypt_key)
            }
            ContentType::EncryptedStream => decrypt_symmetric_file(&self.path, &self.decrypt_key),
        }
    }

    fn loader_type(&self) -> &'static str {
        "file"
    }
}
