use crate::output::{print_json, print_table};
use anyhow::Context;
use grove_core::{config::Config, inspect};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;
    let workspaces = inspect::list(root, &cfg)?;

    if json {
        return print_json(&workspaces);
    }

    if workspaces.is_empty() {
        println!(
            "No workspaces under {}",
            cfg.workspaces_root(root).display()
        );
        return Ok(());
    }

    let rows = workspaces
        .iter()
        .map(|ws| {
            vec![
                ws.name.clone(),
                ws.branch.clone().unwrap_or_else(|| "-".to_string()),
                ws.port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                ws.directory.display().to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "BRANCH", "PORT", "DIRECTORY"], rows);

    Ok(())
}
