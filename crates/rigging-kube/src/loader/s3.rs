//! Object storage kubeconfig loader

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rigging_core::{EnvDefaults, SecretContext};

use super::{AwsDownloader, KubeconfigLoader, LoaderParams, ObjectDownloader, default_decrypt_key};
use crate::crypto::decrypt_symmetric_stream;
use crate::error::{KubeError, Result};

/// Bucket used when neither the entry nor `S3_BUCKET` names one
pub const DEFAULT_BUCKET: &str = "kubernetes";

/// Object key used when the entry gives no `path`
pub const DEFAULT_PATH: &str = "kubeconfig/kubeconfig.enc.7z";

/// Download timeout used when the entry gives none
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const KNOWN_PARAMS: &[&str] = &[
    "accesskey",
    "secretkey",
    "region",
    "server",
    "bucket",
    "path",
    "decryptkey",
    "timeout",
];

/// Resolved S3 loader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub server: String,
    pub bucket: String,
    pub path: String,
    pub decrypt_key: String,
    pub timeout: Duration,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: String::new(),
            server: String::new(),
            bucket: DEFAULT_BUCKET.to_string(),
            path: DEFAULT_PATH.to_string(),
            decrypt_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl S3Settings {
    /// Resolve settings: explicit parameter, then environment, then default
    ///
    /// The decrypt key falls back to the secret context before the environment.
    pub fn from_params(
        params: &LoaderParams,
        secrets: &SecretContext,
        env: &EnvDefaults,
    ) -> Result<Self> {
        params.log_unknown("s3", KNOWN_PARAMS);

        let pick = |key: &str, fallback: Option<&str>, default: &str| -> String {
            params.get(key).or(fallback).unwrap_or(default).to_string()
        };

        let timeout = match params.get("timeout") {
            Some(raw) => humantime::parse_duration(raw).map_err(|e| KubeError::InvalidParameter {
                name: "timeout".to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            access_key: pick("accesskey", env.s3_access_key.as_deref(), ""),
            secret_key: pick("secretkey", env.s3_secret_key.as_deref(), ""),
            region: pick("region", env.s3_region.as_deref(), ""),
            server: pick("server", env.s3_server.as_deref(), ""),
            bucket: pick("bucket", env.s3_bucket.as_deref(), DEFAULT_BUCKET),
            path: pick("path", None, DEFAULT_PATH),
            decrypt_key: pick("decryptkey", default_decrypt_key(secrets, env), ""),
            timeout,
        })
    }
}

/// Downloads an OpenSSL-encrypted kubeconfig from a bucket
///
/// The object is always treated as a salted stream; no content detection
/// happens for this backend.
#[derive(Debug, Clone)]
pub struct S3Loader {
    settings: S3Settings,
    downloader: Arc<dyn ObjectDownloader>,
}

impl S3Loader {
    /// Loader backed by the AWS SDK
    pub fn new(settings: S3Settings) -> Self {
        let downloader = Arc::new(AwsDownloader::new(&settings));
        Self {
            settings,
            downloader,
        }
    }

    pub fn from_params(
        params: &LoaderParams,
        secrets: &SecretContext,
        env: &EnvDefaults,
    ) -> Result<Self> {
        Ok(Self::new(S3Settings::from_params(params, secrets, env)?))
    }

    /// Replace the object downloader
    pub fn with_downloader(mut self, downloader: Arc<dyn ObjectDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }
}

#[async_trait]
impl KubeconfigLoader for S3Loader {
    async fn load(&self) -> Result<Vec<u8>> {
        let S3Settings {
            bucket,
            path,
            timeout,
            ..
        } = &self.settings;

        let data = tokio::time::timeout(*timeout, self.downloader.download(bucket, path))
            .await
            .map_err(|_| {
                KubeError::download(
                    bucket,
                    path,
                    format!("timed out after {}", humantime::format_duration(*timeout)),
                )
            })??;

        tracing::debug!(bucket = %bucket, key = %path, bytes = data.len(), "downloaded kubeconfig");

        decrypt_symmetric_stream(&data, &self.settings.decrypt_key)
    }

    fn loader_type(&self) -> &'static str {
        "s3"
    }
}
