//! Parsed kubeconfig documents

use kube::config::Kubeconfig;

use crate::error::{KubeError, Result};

/// Kubeconfig bytes together with their parsed form
///
/// The raw bytes are kept so the document can be written back exactly as
/// it was stored.
#[derive(Debug, Clone)]
pub struct LoadedKubeconfig {
    raw: Vec<u8>,
    config: Kubeconfig,
}

impl LoadedKubeconfig {
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let text = std::str::from_utf8(&raw).map_err(|e| KubeError::InvalidKubeconfig {
            message: e.to_string(),
        })?;
        let config = Kubeconfig::from_yaml(text).map_err(|e| KubeError::InvalidKubeconfig {
            message: e.to_string(),
        })?;

        Ok(Self { raw, config })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn config(&self) -> &Kubeconfig {
        &self.config
    }

    pub fn current_context(&self) -> Option<&str> {
        self.config.current_context.as_deref()
    }

    /// Server URL of the cluster behind the current context
    pub fn server(&self) -> Option<&str> {
        let current = self.current_context()?;
        let context = self
            .config
            .contexts
            .iter()
            .find(|c| c.name == current)?
            .context
            .as_ref()?;

        self.config
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)?
            .cluster
            .as_ref()?
            .server
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures");

    #[test]
    fn test_parse_fixture() {
        let raw = std::fs::read(format!("{FIXTURES}/kubeconfig")).unwrap();
        let loaded = LoadedKubeconfig::parse(raw.clone()).unwrap();

        assert_eq!(loaded.raw(), raw.as_slice());
        assert_eq!(loaded.current_context(), Some("cluster-test-01"));
        assert_eq!(loaded.config().clusters.len(), 1);
        assert_eq!(loaded.server(), Some("https://cluster-test-01.example.com:6443"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            LoadedKubeconfig::parse(b"clusters: 12\n".to_vec()),
            Err(KubeError::InvalidKubeconfig { .. })
        ));
        assert!(matches!(
            LoadedKubeconfig::parse(vec![0xff, 0xfe]),
            Err(KubeError::InvalidKubeconfig { .. })
        ));
    }
}
