//! Compile command - merge group-vars into one document

use std::io::Write;
use std::path::Path;

use rigging_core::SecretContext;

use super::{compile_groups, render_values};
use crate::error::Result;

pub fn run(
    groups: &[String],
    group_vars_dir: &Path,
    secrets: &SecretContext,
    skip_eval: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let compiled = compile_groups(groups, group_vars_dir, secrets, skip_eval)?;
    let output = render_values(&compiled.values, json)?;

    if !quiet {
        std::io::stdout().lock().write_all(output.as_bytes())?;
    }

    Ok(())
}
