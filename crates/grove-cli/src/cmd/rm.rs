use crate::output::print_json;
use anyhow::Context;
use grove_core::{config::Config, provision};
use std::path::Path;

pub fn run(root: &Path, name: &str, delete_branch: bool, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;
    let report = provision::remove(root, &cfg, name, delete_branch)?;

    if json {
        return print_json(&report);
    }

    if report.removed_directory {
        println!(
            "Removed workspace '{}' ({})",
            report.name,
            report.directory.display()
        );
    } else {
        println!(
            "Workspace '{}' had no directory; worktree registration pruned",
            report.name
        );
    }
    if let Some(branch) = &report.deleted_branch {
        println!("  deleted branch: {branch}");
    }

    Ok(())
}
