//! Kubeconfig loaders
//!
//! Each inventory entry names a loader backend and its parameters. A loader
//! fetches the raw kubeconfig bytes for its entry, decrypting as needed:
//! - **file**: local file, auto-detected as plaintext, 7z archive or OpenSSL stream
//! - **s3**: object storage download, always an OpenSSL stream

mod downloader;
mod file;
mod s3;

pub use downloader::{AwsDownloader, DirectoryDownloader, ObjectDownloader};
pub use file::FileLoader;
pub use s3::{S3Loader, S3Settings};

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use rigging_core::{EnvDefaults, SecretContext};

use crate::error::{KubeError, Result};

/// Source of raw kubeconfig bytes
///
/// Implementations must be Send + Sync and never touch process-wide state.
#[async_trait]
pub trait KubeconfigLoader: Send + Sync + std::fmt::Debug {
    /// Fetch (and decrypt) the kubeconfig
    async fn load(&self) -> Result<Vec<u8>>;

    /// Backend name, as written in the inventory
    fn loader_type(&self) -> &'static str;
}

/// Supported loader backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    File,
    S3,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::S3 => "s3",
        }
    }
}

impl FromStr for LoaderKind {
    type Err = KubeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "s3" => Ok(Self::S3),
            _ => Err(KubeError::UnsupportedLoaderType {
                kind: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loader parameters from the inventory
///
/// Keys are matched case-insensitively with `_` and `-` ignored, so
/// `decrypt_key`, `decryptKey` and `decrypt-key` are the same parameter.
/// Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderParams {
    values: BTreeMap<String, String>,
}

impl LoaderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Value of a parameter, if set and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&normalize_key(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Log parameters a loader doesn't know about
    pub(crate) fn log_unknown(&self, loader: &str, known: &[&str]) {
        for key in self.values.keys() {
            if !known.contains(&key.as_str()) {
                tracing::debug!(loader, param = %key, "ignoring unknown loader parameter");
            }
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for LoaderParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key.as_ref(), value);
        }
        params
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decrypt key for entries that set none: the secret context's private key,
/// then `EJSON_PRIVKEY`
pub(crate) fn default_decrypt_key<'a>(
    secrets: &'a SecretContext,
    env: &'a EnvDefaults,
) -> Option<&'a str> {
    secrets.private_key.as_deref().or(env.private_key.as_deref())
}

/// Construct the loader for a backend
pub fn build_loader(
    kind: LoaderKind,
    params: &LoaderParams,
    secrets: &SecretContext,
    env: &EnvDefaults,
) -> Result<Box<dyn KubeconfigLoader>> {
    tracing::debug!(loader = %kind, "creating kubeconfig loader");
    match kind {
        LoaderKind::File => Ok(Box::new(FileLoader::from_params(params, secrets, env))),
        LoaderKind::S3 => Ok(Box::new(S3Loader::from_params(params, secrets, env)?)),
    }
}
