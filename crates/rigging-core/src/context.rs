//! Secret context and environment-derived defaults
//!
//! Library code never reads the process environment directly. The binary
//! captures it once with [`EnvDefaults::from_env`] and hands the value to the
//! constructors that need defaults; tests build the value literally.

use std::path::PathBuf;

/// Default directory holding EJSON private keys, one file per public key
pub const DEFAULT_KEY_DIR: &str = "/opt/ejson/keys";

/// Key material used to open EJSON secrets in group-vars files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretContext {
    /// Directory containing `<public key hex>` files with private keys
    pub key_dir: PathBuf,

    /// Private key (hex) that takes precedence over the key directory
    pub private_key: Option<String>,

    /// Do not attempt decryption at all
    pub skip_decrypt: bool,
}

impl Default for SecretContext {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from(DEFAULT_KEY_DIR),
            private_key: None,
            skip_decrypt: false,
        }
    }
}

impl SecretContext {
    pub fn new(key_dir: impl Into<PathBuf>, private_key: Option<String>) -> Self {
        Self {
            key_dir: key_dir.into(),
            private_key: private_key.filter(|k| !k.trim().is_empty()),
            skip_decrypt: false,
        }
    }

    pub fn skip_decrypt(mut self, skip: bool) -> Self {
        self.skip_decrypt = skip;
        self
    }
}

/// Defaults taken from the process environment
///
/// Every field is optional; empty variables count as unset. Explicit loader
/// parameters always win over these values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDefaults {
    pub private_key: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_region: Option<String>,
    pub s3_server: Option<String>,
    pub s3_bucket: Option<String>,
}

impl EnvDefaults {
    pub const PRIVATE_KEY: &'static str = "EJSON_PRIVKEY";
    pub const S3_ACCESS_KEY: &'static str = "S3_ACCESSKEY";
    pub const S3_SECRET_KEY: &'static str = "S3_SECRETKEY";
    pub const S3_REGION: &'static str = "S3_REGION";
    pub const S3_SERVER: &'static str = "S3_SERVER";
    pub const S3_BUCKET: &'static str = "S3_BUCKET";

    /// Capture defaults from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build defaults from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            private_key: get(Self::PRIVATE_KEY),
            s3_access_key: get(Self::S3_ACCESS_KEY),
            s3_secret_key: get(Self::S3_SECRET_KEY),
            s3_region: get(Self::S3_REGION),
            s3_server: get(Self::S3_SERVER),
            s3_bucket: get(Self::S3_BUCKET),
        }
    }
}
