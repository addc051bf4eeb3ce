//! CLI commands

pub mod compile;
pub mod inventory;
pub mod playbook;

use std::path::Path;

use rigging_core::{CompileOptions, Compiled, EnvDefaults, SecretContext, Values};
use rigging_engine::TreeEvaluator;
use rigging_kube::Inventory;

use crate::error::Result;

/// Compile group-vars with the MiniJinja evaluator
pub(crate) fn compile_groups(
    groups: &[String],
    group_vars_dir: &Path,
    secrets: &SecretContext,
    skip_eval: bool,
) -> Result<Compiled> {
    let options = CompileOptions::new(group_vars_dir, groups.to_vec())
        .with_secrets(secrets.clone())
        .skip_eval(skip_eval);

    let compiled = rigging_core::compile(&options, &TreeEvaluator::new())?;

    tracing::debug!(
        groups = %groups.join(","),
        sources = compiled.sources.len(),
        "compiled group vars"
    );

    Ok(compiled)
}

/// Read the inventory, with loader defaults taken from the environment
pub(crate) fn load_inventory(
    path: &Path,
    secrets: &SecretContext,
    skip_kubeconfig: bool,
) -> Result<Inventory> {
    Ok(Inventory::load(
        path,
        secrets,
        &EnvDefaults::from_env(),
        skip_kubeconfig,
    )?)
}

/// Render values as YAML, or JSON derived from the YAML form
pub(crate) fn render_values(values: &Values, json: bool) -> Result<String> {
    let mut output = if json {
        values.to_json()?
    } else {
        values.to_yaml()?
    };

    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}
