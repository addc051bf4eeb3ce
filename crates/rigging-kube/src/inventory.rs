//! Inventory of deployment targets
//!
//! The inventory maps entry names to the loader that fetches their
//! kubeconfig. It is read like any other value file, so an `.ejson`
//! inventory has its secrets opened before parsing.
//!
//! ```yaml
//! inventory:
//!   cluster-dev-01:
//!     groups: [all, dev, cluster-dev-01]
//!     kubeconfig:
//!       type: file
//!       params:
//!         path: clusters/dev/kubeconfig.enc.7z
//! ```

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use regex::Regex;
use rigging_core::{
    CoreError, EnvDefaults, PassthroughEvaluator, SecretContext, ValueFile, Values,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{KubeError, Result};
use crate::kubeconfig::LoadedKubeconfig;
use crate::loader::{KubeconfigLoader, LoaderKind, LoaderParams, build_loader};

/// Optional top-level key wrapping the entries
pub const INVENTORY_KEY: &str = "inventory";

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Deserialize)]
struct EntryDefinition {
    #[serde(default)]
    groups: Option<Vec<String>>,
    kubeconfig: LoaderDefinition,
}

#[derive(Debug, Deserialize)]
struct LoaderDefinition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    params: serde_json::Map<String, JsonValue>,
}

/// One deployment target
#[derive(Debug)]
pub struct Entry {
    name: String,
    groups: Option<Vec<String>>,
    loader_type: String,
    params: LoaderParams,
    secrets: SecretContext,
    env: EnvDefaults,
    loader: OnceCell<Box<dyn KubeconfigLoader>>,
}

impl Entry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group names in merge order, `[all, <name>]` unless the entry lists them
    pub fn groups(&self) -> Vec<String> {
        match &self.groups {
            Some(groups) => groups.clone(),
            None => vec!["all".to_string(), self.name.clone()],
        }
    }

    /// Loader backend named by the entry
    pub fn loader_type(&self) -> &str {
        &self.loader_type
    }

    pub fn params(&self) -> &LoaderParams {
        &self.params
    }

    /// The entry's loader, built on first use
    ///
    /// A decrypt key missing from the parameters comes from the inventory's
    /// secret context, then from the environment.
    pub fn kubeconfig(&self) -> Result<&dyn KubeconfigLoader> {
        let loader = self
            .loader
            .get_or_try_init(|| {
                let kind: LoaderKind = self.loader_type.parse()?;
                build_loader(kind, &self.params, &self.secrets, &self.env)
            })
            .map_err(|e| e.for_entry(&self.name))?;

        Ok(&**loader)
    }

    /// Run the loader and parse what it returns
    pub async fn load_kubeconfig(&self) -> Result<LoadedKubeconfig> {
        let loader = self.kubeconfig()?;

        tracing::debug!(entry = %self.name, loader = loader.loader_type(), "loading kubeconfig");

        let raw = loader.load().await.map_err(|e| e.for_entry(&self.name))?;
        let loaded = LoadedKubeconfig::parse(raw).map_err(|e| e.for_entry(&self.name))?;

        tracing::debug!(
            entry = %self.name,
            context = loaded.current_context().unwrap_or("-"),
            server = loaded.server().unwrap_or("-"),
            "kubeconfig loaded"
        );

        Ok(loaded)
    }
}

/// Entries in definition order
#[derive(Debug, Default)]
pub struct Inventory {
    entries: IndexMap<String, Entry>,
}

impl Inventory {
    /// Read an inventory file
    ///
    /// Unless `skip_kubeconfig` is set, every entry's loader is constructed
    /// right away (nothing is downloaded or decrypted yet) so configuration
    /// errors surface before any work starts.
    pub fn load(
        path: impl AsRef<Path>,
        secrets: &SecretContext,
        env: &EnvDefaults,
        skip_kubeconfig: bool,
    ) -> Result<Self> {
        let path = path.as_ref();

        let file =
            ValueFile::load(path, true, secrets, &PassthroughEvaluator).map_err(|e| match e {
                CoreError::NotFound { path } => KubeError::NotFound { path },
                other => KubeError::InvalidInventory {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;

        if let Some(warning) = file.decryption().warning() {
            tracing::warn!(path = %path.display(), "inventory secrets not decrypted: {warning}");
        }

        let tree = file.into_values().into_inner();
        Self::from_tree(path, tree, secrets, env, skip_kubeconfig)
    }

    /// Parse an inventory held in memory
    pub fn from_yaml(
        text: &str,
        secrets: &SecretContext,
        env: &EnvDefaults,
        skip_kubeconfig: bool,
    ) -> Result<Self> {
        let path = Path::new(INLINE_SOURCE);
        let tree = Values::from_yaml(text).map_err(|e| KubeError::InvalidInventory {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_tree(path, tree.into_inner(), secrets, env, skip_kubeconfig)
    }

    fn from_tree(
        path: &Path,
        tree: JsonValue,
        secrets: &SecretContext,
        env: &EnvDefaults,
        skip_kubeconfig: bool,
    ) -> Result<Self> {
        let invalid = |message: String| KubeError::InvalidInventory {
            path: path.to_path_buf(),
            message,
        };

        let mut root = match tree {
            JsonValue::Object(map) => map,
            JsonValue::Null => serde_json::Map::new(),
            _ => return Err(invalid("root must be a mapping".to_string())),
        };

        let definitions = match root.remove(INVENTORY_KEY) {
            Some(JsonValue::Object(map)) => map,
            Some(JsonValue::Null) => serde_json::Map::new(),
            Some(_) => return Err(invalid(format!("'{INVENTORY_KEY}' must be a mapping"))),
            None => root,
        };

        let mut entries = IndexMap::with_capacity(definitions.len());
        for (name, value) in definitions {
            let definition: EntryDefinition = serde_json::from_value(value)
                .map_err(|e| invalid(format!("entry '{name}': {e}")))?;

            let params = definition
                .kubeconfig
                .params
                .into_iter()
                .map(|(key, value)| Ok((key.clone(), param_string(&name, &key, value)?)))
                .collect::<std::result::Result<LoaderParams, String>>()
                .map_err(invalid)?;

            let entry = Entry {
                name: name.clone(),
                groups: definition.groups,
                loader_type: definition.kubeconfig.kind,
                params,
                secrets: secrets.clone(),
                env: env.clone(),
                loader: OnceCell::new(),
            };

            if !skip_kubeconfig {
                entry.kubeconfig()?;
            }

            entries.insert(name, entry);
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded inventory");

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &IndexMap<String, Entry> {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries.get(name).ok_or_else(|| KubeError::EntryNotFound {
            name: name.to_string(),
        })
    }

    /// Names matching `filter` as a whole, in definition order
    pub fn entry_names(&self, filter: &str) -> Result<Vec<String>> {
        let matcher =
            Regex::new(&format!("^(?:{filter})$")).map_err(|source| KubeError::InvalidPattern {
                pattern: filter.to_string(),
                source,
            })?;

        Ok(self
            .entries
            .keys()
            .filter(|name| matcher.is_match(name))
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loader parameters are strings; YAML scalars are converted
fn param_string(entry: &str, key: &str, value: JsonValue) -> std::result::Result<String, String> {
    match value {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Ok(String::new()),
        _ => Err(format!("entry '{entry}': parameter '{key}' must be a scalar")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{FileLoader, S3Loader};
    use std::path::PathBuf;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures");

    fn fixture(name: &str) -> PathBuf {
        Path::new(FIXTURES).join(name)
    }

    fn parse(yaml: &str, skip_kubeconfig: bool) -> Result<Inventory> {
        Inventory::from_yaml(
            yaml,
            &SecretContext::default(),
            &EnvDefaults::default(),
            skip_kubeconfig,
        )
    }

    fn load_fixture(name: &str, skip_kubeconfig: bool) -> Inventory {
        Inventory::load(
            fixture(name),
            &SecretContext::default(),
            &EnvDefaults::default(),
            skip_kubeconfig,
        )
        .unwrap()
    }

    #[test]
    fn test_entry_names_full() {
        let inventory = load_fixture("inventory.yaml", true);
        let names = inventory.entry_names(".*").unwrap();

        assert_eq!(
            names,
            vec![
                "cluster-test-01-preflight",
                "cluster-dev-01",
                "cluster-test-01",
                "cluster-stage-01",
                "cluster-stage-02",
                "cluster-stage-03",
                "cluster-prod-01",
                "cluster-prod-02",
                "cluster-prod-03",
                "cluster-prod-04",
            ]
        );
    }

    #[test]
    fn test_entry_names_are_matched_whole() {
        let inventory = load_fixture("inventory.yaml", true);

        assert_eq!(inventory.entry_names("cluster-dev-01").unwrap(), vec!["cluster-dev-01"]);
        assert_eq!(inventory.entry_names("cluster-test-01").unwrap(), vec!["cluster-test-01"]);
        assert_eq!(
            inventory.entry_names("cluster-stage-.*").unwrap(),
            vec!["cluster-stage-01", "cluster-stage-02", "cluster-stage-03"]
        );
        assert!(inventory.entry_names("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_filter() {
        let inventory = load_fixture("inventory.yaml", true);
        assert!(matches!(
            inventory.entry_names("cluster-("),
            Err(KubeError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_eager_loader_construction() {
        let inventory = load_fixture("inventory_file.yaml", false);
        assert_eq!(
            inventory.entry_names(".*").unwrap(),
            vec!["cluster-test-01", "cluster-test-02", "cluster-test-03"]
        );
        for entry in inventory.entries().values() {
            assert_eq!(entry.kubeconfig().unwrap().loader_type(), "file");
        }
    }

    #[test]
    fn test_groups_default_and_explicit() {
        let inventory = load_fixture("inventory.yaml", true);

        assert_eq!(
            inventory.entry("cluster-dev-01").unwrap().groups(),
            vec!["all", "dev", "cluster-dev-01"]
        );
        assert_eq!(
            inventory.entry("cluster-prod-04").unwrap().groups(),
            vec!["all", "cluster-prod-04"]
        );
    }

    #[test]
    fn test_entry_not_found() {
        let inventory = load_fixture("inventory.yaml", true);
        let err = inventory.entry("cluster-qa-01").unwrap_err();
        assert!(matches!(err, KubeError::EntryNotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bare_mapping_and_scalar_params() {
        let yaml = r#"
edge-01:
  kubeconfig:
    type: s3
    params:
      bucket: edge
      timeout: 30s
      path: 2024
"#;
        let inventory = parse(yaml, true).unwrap();
        let entry = inventory.entry("edge-01").unwrap();

        assert_eq!(entry.loader_type(), "s3");
        assert_eq!(entry.params().get("path"), Some("2024"));
        assert_eq!(entry.kubeconfig().unwrap().loader_type(), "s3");
    }

    #[test]
    fn test_unsupported_loader_type() {
        let yaml = r#"
inventory:
  legacy:
    kubeconfig:
      type: vault
"#;
        // Parsing alone succeeds when loaders are not built
        let inventory = parse(yaml, true).unwrap();
        let err = inventory.entry("legacy").unwrap().kubeconfig().unwrap_err();
        assert!(matches!(err.root(), KubeError::UnsupportedLoaderType { kind } if kind == "vault"));
        assert!(err.to_string().starts_with("entry 'legacy'"));

        let err = parse(yaml, false).unwrap_err();
        assert!(matches!(err.root(), KubeError::UnsupportedLoaderType { .. }));
    }

    #[test]
    fn test_invalid_definitions() {
        let missing_loader = "inventory:\n  a:\n    groups: [all]\n";
        assert!(matches!(
            parse(missing_loader, true),
            Err(KubeError::InvalidInventory { .. })
        ));

        let nested_param = "a:\n  kubeconfig:\n    type: file\n    params:\n      path: [x]\n";
        assert!(matches!(
            parse(nested_param, true),
            Err(KubeError::InvalidInventory { .. })
        ));

        assert!(matches!(
            parse("- a\n- b\n", true),
            Err(KubeError::InvalidInventory { .. })
        ));
    }

    #[test]
    fn test_empty_inventory() {
        let inventory = parse("", false).unwrap();
        assert!(inventory.is_empty());
        assert!(inventory.entry_names(".*").unwrap().is_empty());
    }

    #[test]
    fn test_missing_inventory_file() {
        let err = Inventory::load(
            "/nonexistent/inventory.yaml",
            &SecretContext::default(),
            &EnvDefaults::default(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, KubeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_env_defaults_reach_loaders() {
        let yaml = "a:\n  kubeconfig:\n    type: file\n";
        let env = EnvDefaults {
            private_key: Some("from-env".into()),
            ..Default::default()
        };
        let inventory =
            Inventory::from_yaml(yaml, &SecretContext::default(), &env, false).unwrap();
        let entry = inventory.entry("a").unwrap();

        let expected = format!("{:?}", FileLoader::new("kubeconfig", "from-env"));
        assert_eq!(format!("{:?}", entry.kubeconfig().unwrap()), expected);

        // S3 settings follow the same precedence
        let s3 = S3Loader::from_params(entry.params(), &SecretContext::default(), &env).unwrap();
        assert_eq!(s3.settings().decrypt_key, "from-env");
    }

    #[tokio::test]
    async fn test_secret_context_key_reaches_loaders() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(
            &path,
            format!(
                "a:\n  kubeconfig:\n    type: file\n    params:\n      path: {}\n",
                fixture("kubeconfig.enc").display()
            ),
        )
        .unwrap();

        let env = EnvDefaults {
            private_key: Some("from-env".into()),
            ..Default::default()
        };
        let secrets = SecretContext::new(dir.path(), Some("test123".to_string()));
        let inventory = Inventory::load(&path, &secrets, &env, false).unwrap();

        let loaded = inventory.entry("a").unwrap().load_kubeconfig().await.unwrap();
        assert_eq!(loaded.raw(), std::fs::read(fixture("kubeconfig")).unwrap());

        // An explicit parameter still wins over the context
        let yaml = "b:\n  kubeconfig:\n    type: s3\n    params:\n      decrypt_key: explicit\n";
        let inventory = Inventory::from_yaml(yaml, &secrets, &env, true).unwrap();
        let params = inventory.entry("b").unwrap().params();
        let s3 = S3Loader::from_params(params, &secrets, &env).unwrap();
        assert_eq!(s3.settings().decrypt_key, "explicit");
    }

    #[test]
    fn test_inline_inventory_expands_merge_keys() {
        let yaml = r#"
edge-01: &edge
  groups: [all, edge]
  kubeconfig:
    type: file
edge-02:
  <<: *edge
  groups: [all, edge, edge-02]
"#;
        let inventory = parse(yaml, true).unwrap();
        assert_eq!(inventory.len(), 2);

        let merged = inventory.entry("edge-02").unwrap();
        assert_eq!(merged.loader_type(), "file");
        assert_eq!(merged.groups(), vec!["all", "edge", "edge-02"]);
    }

    #[tokio::test]
    async fn test_load_kubeconfig_through_entry() {
        let yaml = format!(
            r#"
cluster-test-01:
  kubeconfig:
    type: file
    params:
      path: {}
      decrypt_key: test123
"#,
            fixture("kubeconfig.enc").display()
        );
        let inventory = parse(&yaml, false).unwrap();
        let loaded = inventory
            .entry("cluster-test-01")
            .unwrap()
            .load_kubeconfig()
            .await
            .unwrap();

        assert_eq!(loaded.raw(), std::fs::read(fixture("kubeconfig")).unwrap());
        assert_eq!(loaded.current_context(), Some("cluster-test-01"));
    }

    #[tokio::test]
    async fn test_load_kubeconfig_error_names_entry() {
        let yaml = r#"
broken:
  kubeconfig:
    type: file
    params:
      path: /nonexistent/kubeconfig
"#;
        let inventory = parse(yaml, false).unwrap();

        let err = inventory.entry("broken").unwrap().load_kubeconfig().await.unwrap_err();
        assert!(matches!(&err, KubeError::Entry { name, .. } if name == "broken"));
        assert!(err.is_not_found());
    }
}
