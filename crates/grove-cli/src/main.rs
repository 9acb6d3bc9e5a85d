mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::new::NewArgs;
use grove_core::GroveError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "grove",
    about = "Workspace provisioning — isolated git worktrees with shared resources and ports",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from git or .grove/)
    #[arg(long, global = true, env = "GROVE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the shared-resource layout and write .grove/config.yaml
    Init,

    /// Provision a workspace: worktree, shared links, port, descriptor
    New(NewArgs),

    /// List provisioned workspaces
    List,

    /// Check the shared-resource links of a workspace
    Links {
        /// Workspace name
        name: String,
    },

    /// Assign or refresh the port of an existing workspace
    Port {
        /// Workspace name
        name: String,
    },

    /// Remove a workspace and its worktree registration
    Rm {
        /// Workspace name
        name: String,

        /// Also delete the branch the workspace had checked out
        #[arg(long)]
        delete_branch: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::New(args) => cmd::new::run(&root, &args, cli.json),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Links { name } => cmd::links::run(&root, &name, cli.json),
        Commands::Port { name } => cmd::port::run(&root, &name, cli.json),
        Commands::Rm {
            name,
            delete_branch,
        } => cmd::rm::run(&root, &name, delete_branch, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Stable per-failure exit codes, so calling scripts can branch on the
/// outcome without parsing stderr. Anything outside the tagged set is 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<GroveError>()
        .map(GroveError::exit_code)
        .unwrap_or(1)
}
