use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use grove_core::{
    config::Config,
    paths,
    provision::{self, PortStatus, ProvisionOptions},
    types::{IncludeChanges, WorkspaceRequest},
};
use std::path::Path;

#[derive(Args)]
pub struct NewArgs {
    /// Workspace name (directory basename under the workspaces root)
    pub name: String,

    /// Branch to create or resume (default: the workspace name)
    #[arg(long)]
    pub branch: Option<String>,

    /// Branch or remote ref to fork from (default: the primary branch)
    #[arg(long)]
    pub source_branch: Option<String>,

    /// Which local state of the source to carry into the new workspace
    #[arg(
        long,
        value_parser = ["none", "uncommitted", "unpushed", "all"],
        default_value = "none"
    )]
    pub include_changes: String,

    /// Carry nothing from the source (same as --include-changes none)
    #[arg(long, conflicts_with = "include_changes")]
    pub exclude_changes: bool,

    /// Complete a half-provisioned workspace instead of failing on the
    /// existing branch or directory
    #[arg(long)]
    pub resume: bool,
}

pub fn run(root: &Path, args: &NewArgs, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;

    let source = args
        .source_branch
        .clone()
        .unwrap_or_else(|| cfg.primary_branch.clone());
    let request = WorkspaceRequest::new(args.name.clone(), args.branch.clone(), source);

    let include_changes = if args.exclude_changes {
        IncludeChanges::None
    } else {
        args.include_changes.parse()?
    };
    let opts = ProvisionOptions {
        include_changes,
        resume: args.resume,
    };

    let outcome = provision::provision(root, &cfg, &request, &opts)?;

    if json {
        return print_json(&outcome);
    }

    let record = &outcome.record;
    if outcome.resumed {
        println!("Resumed workspace '{}'", record.name);
    } else {
        println!("Created workspace '{}'", record.name);
    }
    println!("  branch:    {} (from {})", record.branch, record.source);
    println!("  directory: {}", record.directory.display());
    println!(
        "  links:     {} created, {} already in place",
        record.links.created.len(),
        record.links.existing.len()
    );
    match outcome.port_status {
        PortStatus::Assigned { port } => println!("  port:      {port}"),
        PortStatus::Reused { port } => println!("  port:      {port} (kept from previous run)"),
        PortStatus::Skipped => println!("  port:      disabled in config"),
        PortStatus::Exhausted { attempts } => println!(
            "  port:      none free after {attempts} attempts; run `grove port {}` once one opens up",
            record.name
        ),
    }
    if outcome.changes.patch_applied || outcome.changes.untracked_copied > 0 {
        println!(
            "  changes:   uncommitted work carried over ({} untracked files)",
            outcome.changes.untracked_copied
        );
    }
    println!(
        "  env:       {}",
        record.directory.join(paths::ENV_FILE).display()
    );

    Ok(())
}
