//! Playbook command - resolve plays for each inventory entry

use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use rigging_core::{Playbook, SecretContext};
use rigging_engine::TreeEvaluator;

use super::{compile_groups, load_inventory};
use crate::error::Result;

/// Print `{ <entry>: { plays: [...] } }` for every matching entry
pub fn run(
    playbook_path: &Path,
    inventory_path: &Path,
    secrets: &SecretContext,
    filter: &str,
    group_vars_dir: &Path,
    skip_eval: bool,
) -> Result<()> {
    let inventory = load_inventory(inventory_path, secrets, true)?;
    let evaluator = TreeEvaluator::new();

    let mut resolved: IndexMap<String, Playbook> = IndexMap::new();
    for name in inventory.entry_names(filter)? {
        let groups = inventory.entry(&name)?.groups();
        let compiled = compile_groups(&groups, group_vars_dir, secrets, skip_eval)?;

        let playbook = Playbook::load(playbook_path, &compiled.values, &evaluator, skip_eval)?;
        tracing::debug!(entry = %name, plays = playbook.plays.len(), "resolved playbook");

        resolved.insert(name, playbook);
    }

    let output = serde_yaml::to_string(&resolved)?;
    std::io::stdout().lock().write_all(output.as_bytes())?;

    Ok(())
}
