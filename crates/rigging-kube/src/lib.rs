//! Rigging Kube - kubeconfig resolution for inventory entries
//!
//! This crate provides:
//! - **Inventory**: Named deployment targets and the loader for each one
//! - **Loaders**: Fetch kubeconfigs from local files or object storage
//! - **Classification**: Detect plaintext, 7z archives and OpenSSL streams by content
//! - **Decryption**: OpenSSL salted streams and password-protected 7z archives

pub mod archive;
pub mod classify;
pub mod crypto;
pub mod error;
pub mod inventory;
pub mod kubeconfig;
pub mod loader;

pub use archive::extract_single_file_archive;
pub use classify::{ContentType, classify, classify_file};
pub use crypto::{decrypt_symmetric_file, decrypt_symmetric_stream};
pub use error::{KubeError, Result};
pub use inventory::{Entry, Inventory};
pub use kubeconfig::LoadedKubeconfig;
pub use loader::{
    AwsDownloader, DirectoryDownloader, FileLoader, KubeconfigLoader, LoaderKind, LoaderParams,
    ObjectDownloader, S3Loader, S3Settings, build_loader,
};
