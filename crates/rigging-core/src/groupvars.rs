//! Group-vars compilation
//!
//! Groups are priority tiers. For each group, in order, the files
//! `<dir>/<group>.{yaml,yml,json,ejson}` and every such file directly inside
//! `<dir>/<group>/` are loaded and merged, later files overriding earlier ones.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::SecretContext;
use crate::error::{CoreError, Result};
use crate::evaluate::{EvalScope, Evaluator};
use crate::value_file::{ValueFile, evaluator_error};
use crate::values::Values;

/// File extensions considered value files
pub const VALUE_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "ejson"];

/// Inputs of a compile run
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub group_vars_dir: PathBuf,
    pub groups: Vec<String>,
    pub secrets: SecretContext,
    pub skip_eval: bool,
}

impl CompileOptions {
    pub fn new(group_vars_dir: impl Into<PathBuf>, groups: Vec<String>) -> Self {
        Self {
            group_vars_dir: group_vars_dir.into(),
            groups,
            secrets: SecretContext::default(),
            skip_eval: false,
        }
    }

    pub fn with_secrets(mut self, secrets: SecretContext) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn skip_eval(mut self, skip: bool) -> Self {
        self.skip_eval = skip;
        self
    }
}

/// A value file whose secrets could not be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a compile run
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Merged (and evaluated) tree
    pub values: Values,

    /// Files that contributed, in merge order
    pub sources: Vec<PathBuf>,

    pub warnings: Vec<DecryptWarning>,
}

/// Merge the value files of `options.groups` into one tree
pub fn compile(options: &CompileOptions, evaluator: &dyn Evaluator) -> Result<Compiled> {
    let mut values = Values::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    for group in &options.groups {
        let files = group_files(&options.group_vars_dir, group)?;
        if files.is_empty() {
            tracing::debug!(group = %group, "group has no value files");
        }

        for path in files {
            let file = ValueFile::load(&path, options.skip_eval, &options.secrets, evaluator)?;

            if let Some(warning) = file.decryption().warning() {
                warnings.push(DecryptWarning {
                    path: path.clone(),
                    message: warning.to_string(),
                });
            }

            tracing::debug!(group = %group, path = %path.display(), "merging value file");
            values.merge(file.raw());
            sources.push(path);
        }
    }

    if !options.skip_eval {
        values = evaluator
            .evaluate(values, EvalScope::Merged)
            .map_err(|e| evaluator_error(options.groups.join(","), e.as_ref()))?;
    }

    Ok(Compiled {
        values,
        sources,
        warnings,
    })
}

/// Value files belonging to one group, in merge order
pub fn group_files(group_vars_dir: &Path, group: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for ext in VALUE_EXTENSIONS {
        let candidate = group_vars_dir.join(format!("{group}.{ext}"));
        if candidate.is_file() {
            files.push(candidate);
        }
    }

    let group_dir = group_vars_dir.join(group);
    if group_dir.is_dir() {
        for entry in WalkDir::new(&group_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| CoreError::Read {
                path: group_dir.clone(),
                source: e.into(),
            })?;
            if entry.file_type().is_file()
                && !is_hidden(entry.path())
                && has_value_extension(entry.path())
            {
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn has_value_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VALUE_EXTENSIONS.contains(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejson::testing::{encrypt, keypair};
    use crate::evaluate::{EvalError, PassthroughEvaluator};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Records the scopes it is called with
    #[derive(Default)]
    struct RecordingEvaluator {
        scopes: Mutex<Vec<EvalScope>>,
    }

    impl Evaluator for RecordingEvaluator {
        fn evaluate(
            &self,
            tree: Values,
            scope: EvalScope,
        ) -> std::result::Result<Values, EvalError> {
            self.scopes.lock().unwrap().push(scope);
            Ok(tree)
        }
    }

    #[test]
    fn test_compile_priority_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "base.yaml", "tier: base\nonly_base: true\n");
        write(dir.path(), "region/10-net.yaml", "tier: region\ncidr: 10.0.0.0/8\n");
        write(dir.path(), "cluster.yml", "tier: cluster\n");

        let options = CompileOptions::new(dir.path(), groups(&["base", "region", "cluster"]));
        let compiled = compile(&options, &PassthroughEvaluator).unwrap();

        assert_eq!(compiled.values.get("tier").unwrap(), "cluster");
        assert_eq!(compiled.values.get("only_base").unwrap(), true);
        assert_eq!(compiled.values.get("cidr").unwrap(), "10.0.0.0/8");
        assert_eq!(compiled.sources.len(), 3);
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_compile_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "all/a.yaml", "x: 1\nnested: {a: 1}\n");
        write(dir.path(), "all/b.yaml", "nested: {b: 2}\n");

        let options = CompileOptions::new(dir.path(), groups(&["all"]));
        let first = compile(&options, &PassthroughEvaluator).unwrap();
        let second = compile(&options, &PassthroughEvaluator).unwrap();

        assert_eq!(first.values, second.values);
        assert_eq!(first.values.to_yaml().unwrap(), "x: 1\nnested:\n  a: 1\n  b: 2\n");
    }

    #[test]
    fn test_compile_missing_group_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "all.yaml", "a: 1\n");

        let options = CompileOptions::new(dir.path(), groups(&["all", "nope"]));
        let compiled = compile(&options, &PassthroughEvaluator).unwrap();

        assert_eq!(compiled.sources.len(), 1);
        assert_eq!(compiled.values.get("a").unwrap(), 1);
    }

    #[test]
    fn test_group_files_order_and_filtering() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "web.yaml", "a: 1\n");
        write(dir.path(), "web.json", "{}");
        write(dir.path(), "web/20-b.yaml", "b: 1\n");
        write(dir.path(), "web/10-a.yml", "a: 2\n");
        write(dir.path(), "web/.hidden.yaml", "h: 1\n");
        write(dir.path(), "web/README.md", "docs\n");
        write(dir.path(), "web/nested/deep.yaml", "d: 1\n");

        let files = group_files(dir.path(), "web").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, ["web.yaml", "web.json", "web/10-a.yml", "web/20-b.yaml"]);
    }

    #[test]
    fn test_compile_decrypt_failure_is_a_warning() {
        let (public, _) = keypair();
        let dir = TempDir::new().unwrap();
        let keys = TempDir::new().unwrap();
        let doc = serde_json::json!({
            "_public_key": public,
            "password": encrypt("hunter2", &public),
            "user": "admin",
        });
        write(dir.path(), "all.yaml", "user: nobody\nport: 5432\n");
        write(dir.path(), "all/secrets.ejson", &doc.to_string());

        let options = CompileOptions::new(dir.path(), groups(&["all"]))
            .with_secrets(SecretContext::new(keys.path(), None));
        let compiled = compile(&options, &PassthroughEvaluator).unwrap();

        assert_eq!(compiled.warnings.len(), 1);
        assert!(compiled.warnings[0].path.ends_with("secrets.ejson"));
        assert_eq!(compiled.values.get("user").unwrap(), "admin");
        assert_eq!(compiled.values.get("port").unwrap(), 5432);
    }

    #[test]
    fn test_compile_decrypts_with_private_key() {
        let (public, private) = keypair();
        let dir = TempDir::new().unwrap();
        let doc = serde_json::json!({
            "_public_key": public,
            "password": encrypt("hunter2", &public),
        });
        write(dir.path(), "all.ejson", &doc.to_string());

        let options = CompileOptions::new(dir.path(), groups(&["all"]))
            .with_secrets(SecretContext::new("/nonexistent", Some(private)));
        let compiled = compile(&options, &PassthroughEvaluator).unwrap();

        assert!(compiled.warnings.is_empty());
        assert_eq!(compiled.values.get("password").unwrap(), "hunter2");
    }

    #[test]
    fn test_compile_parse_error_aborts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "all.yaml", "a: 1\n");
        write(dir.path(), "all/broken.yaml", "a: [unclosed\n");

        let options = CompileOptions::new(dir.path(), groups(&["all"]));
        let err = compile(&options, &PassthroughEvaluator);

        assert!(matches!(err, Err(CoreError::Parse { path, .. }) if path.ends_with("broken.yaml")));
    }

    #[test]
    fn test_compile_evaluates_fragments_then_merged_tree() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "a: 1\n");
        write(dir.path(), "b.yaml", "b: 1\n");

        let evaluator = RecordingEvaluator::default();
        let options = CompileOptions::new(dir.path(), groups(&["a", "b"]));
        compile(&options, &evaluator).unwrap();

        assert_eq!(
            *evaluator.scopes.lock().unwrap(),
            [EvalScope::Fragment, EvalScope::Fragment, EvalScope::Merged]
        );

        let evaluator = RecordingEvaluator::default();
        compile(&options.clone().skip_eval(true), &evaluator).unwrap();
        assert!(evaluator.scopes.lock().unwrap().is_empty());
    }
}
