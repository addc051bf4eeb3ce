//! Inventory commands - list entries, print kubeconfigs and values

use std::io::Write;
use std::path::Path;

use console::style;
use rigging_core::SecretContext;

use super::{compile_groups, load_inventory, render_values};
use crate::error::Result;

/// Print the names of matching entries, one per line
pub fn list(
    inventory_path: &Path,
    secrets: &SecretContext,
    filter: &str,
    long: bool,
) -> Result<()> {
    let inventory = load_inventory(inventory_path, secrets, true)?;
    let names = inventory.entry_names(filter)?;

    if !long {
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let width = names.iter().map(String::len).max().unwrap_or(0).max(4);

    println!(
        "{:<width$}  {:<6}  {}",
        style("NAME").bold(),
        style("LOADER").bold(),
        style("GROUPS").bold()
    );

    for name in names {
        let entry = inventory.entry(&name)?;
        println!(
            "{:<width$}  {:<6}  {}",
            name,
            entry.loader_type(),
            entry.groups().join(",")
        );
    }

    Ok(())
}

/// Write the entry's kubeconfig to stdout exactly as stored
pub async fn kubeconfig(inventory_path: &Path, secrets: &SecretContext, name: &str) -> Result<()> {
    let inventory = load_inventory(inventory_path, secrets, false)?;
    let loaded = inventory.entry(name)?.load_kubeconfig().await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(loaded.raw())?;
    if !loaded.raw().ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }

    Ok(())
}

/// Compile the values of the entry's groups
pub fn values(
    inventory_path: &Path,
    secrets: &SecretContext,
    name: &str,
    group_vars_dir: &Path,
    skip_eval: bool,
    json: bool,
) -> Result<()> {
    let inventory = load_inventory(inventory_path, secrets, true)?;
    let groups = inventory.entry(name)?.groups();

    let compiled = compile_groups(&groups, group_vars_dir, secrets, skip_eval)?;
    std::io::stdout()
        .lock()
        .write_all(render_values(&compiled.values, json)?.as_bytes())?;

    Ok(())
}
