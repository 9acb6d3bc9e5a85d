use crate::output::print_json;
use anyhow::Context;
use grove_core::{config::Config, paths, provision};
use std::path::Path;

/// Unlike provisioning, where a dry port range degrades the result instead
/// of failing it, an explicit `grove port` call has nothing to deliver but
/// the port, so exhaustion here is a hard error.
pub fn run(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;
    let assignment = provision::assign_port(root, &cfg, name)?;

    if json {
        return print_json(&assignment);
    }

    println!(
        "Workspace '{}' listens on port {}",
        assignment.workspace, assignment.port
    );
    println!("  base url: {}", assignment.base_url);
    // The primary branch's checkout is the repository root itself.
    let workspace_dir = cfg.workspace_dir(root, name);
    let env_dir = if workspace_dir.is_dir() {
        workspace_dir
    } else {
        root.to_path_buf()
    };
    println!("  recorded: {}", env_dir.join(paths::ENV_FILE).display());

    Ok(())
}
