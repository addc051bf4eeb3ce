//! Object storage access for the S3 loader

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;

use super::S3Settings;
use crate::error::{KubeError, Result};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Fetches whole objects from a bucket
#[async_trait]
pub trait ObjectDownloader: Send + Sync + std::fmt::Debug {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Downloader backed by the AWS SDK
///
/// Uses static credentials. A custom server switches to path-style
/// addressing, as S3-compatible stores (MinIO, Ceph) expect.
#[derive(Debug, Clone)]
pub struct AwsDownloader {
    client: Client,
}

impl AwsDownloader {
    pub fn new(settings: &S3Settings) -> Self {
        let region = if settings.region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            settings.region.clone()
        };

        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "rigging",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials);

        if !settings.server.is_empty() {
            tracing::debug!(server = %settings.server, "using custom S3 endpoint");
            builder = builder
                .endpoint_url(endpoint_url(&settings.server))
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

/// Servers given as bare `host:port` are reached over https
fn endpoint_url(server: &str) -> String {
    if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}

#[async_trait]
impl ObjectDownloader for AwsDownloader {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        tracing::debug!("downloading s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| KubeError::download(bucket, key, DisplayErrorContext(&e)))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| KubeError::download(bucket, key, e))?;

        Ok(body.into_bytes().to_vec())
    }
}

/// Downloader that serves `<root>/<bucket>/<key>` from the filesystem
///
/// Useful for tests and for mirrored buckets on local disk.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    root: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectDownloader for DirectoryDownloader {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.root.join(bucket).join(key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| KubeError::download(bucket, key, e))
    }
}
