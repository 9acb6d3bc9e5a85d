use crate::output::{print_json, print_table};
use anyhow::Context;
use grove_core::{
    config::Config,
    links::{self, LinkState},
    paths, GroveError,
};
use std::path::Path;

pub fn run(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;
    paths::validate_workspace_name(name)?;

    let dir = cfg.workspace_dir(root, name);
    if !dir.is_dir() {
        return Err(GroveError::WorkspaceNotFound(name.to_string()).into());
    }

    let statuses = links::survey(root, &cfg, &dir);

    if json {
        return print_json(&statuses);
    }

    let rows = statuses
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                state_label(s.state).to_string(),
                s.target.display().to_string(),
            ]
        })
        .collect();
    print_table(&["LINK", "STATE", "TARGET"], rows);

    let broken = statuses
        .iter()
        .filter(|s| !matches!(s.state, LinkState::Ok | LinkState::Skipped))
        .count();
    if broken > 0 {
        println!("\n{broken} link(s) need attention; `grove new {name} --resume` repairs them.");
    }

    Ok(())
}

fn state_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Ok => "ok",
        LinkState::Missing => "missing",
        LinkState::WrongTarget => "wrong target",
        LinkState::NotALink => "not a link",
        LinkState::TargetMissing => "target missing",
        LinkState::Skipped => "skipped (optional)",
    }
}
