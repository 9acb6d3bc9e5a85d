//! Read-only workspace state inspection.
//!
//! Everything provisioning needs to know before it mutates anything:
//! whether the branch and directory already exist, where the source branch
//! resolves, and what local state the source is carrying. The snapshot is
//! plain data; deciding what it means (fresh, resume, conflict) is the
//! provisioning state machine's job.

use crate::config::Config;
use crate::descriptor::WorkspaceEnv;
use crate::error::Result;
use crate::git;
use crate::paths;
use crate::types::WorkspaceRequest;
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SourceState {
    /// A local branch, possibly checked out in some worktree.
    Local {
        branch: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        checked_out_at: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upstream: Option<String>,
        has_uncommitted: bool,
        unpushed: u32,
    },
    /// No local branch, but a remote-tracking ref exists.
    Remote { refname: String, remote: String },
    Missing { name: String },
}

impl SourceState {
    /// The ref to fork from when local commits should be carried.
    pub fn refname(&self) -> Option<&str> {
        match self {
            SourceState::Local { branch, .. } => Some(branch),
            SourceState::Remote { refname, .. } => Some(refname),
            SourceState::Missing { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub name: String,
    pub branch: String,
    pub branch_exists: bool,
    pub directory: PathBuf,
    pub directory_exists: bool,
    /// Where the branch is checked out, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_for_branch: Option<PathBuf>,
    pub source: SourceState,
}

/// Take the snapshot for a request. Read-only — no side effects.
pub fn inspect(root: &Path, cfg: &Config, request: &WorkspaceRequest) -> Result<WorkspaceSnapshot> {
    let directory = cfg.workspace_dir(root, &request.name);
    let branch_exists = git::branch_exists(root, &request.branch)?;
    let worktree_for_branch = if branch_exists {
        git::find_worktree_for_branch(root, &request.branch)?
    } else {
        None
    };
    let source = inspect_source(root, &request.source_branch)?;

    Ok(WorkspaceSnapshot {
        name: request.name.clone(),
        branch: request.branch.clone(),
        branch_exists,
        directory_exists: directory.exists(),
        directory,
        worktree_for_branch,
        source,
    })
}

/// Resolution order: local branch, then `origin/<name>`.
fn inspect_source(root: &Path, source: &str) -> Result<SourceState> {
    if git::branch_exists(root, source)? {
        let checked_out_at = git::find_worktree_for_branch(root, source)?;
        let has_uncommitted = match &checked_out_at {
            Some(dir) => git::has_uncommitted(dir)?,
            None => false,
        };
        return Ok(SourceState::Local {
            branch: source.to_string(),
            upstream: git::upstream_of(root, source)?,
            unpushed: git::unpushed_count(root, source)?,
            checked_out_at,
            has_uncommitted,
        });
    }
    if git::remote_branch_exists(root, "origin", source)? {
        return Ok(SourceState::Remote {
            refname: format!("origin/{source}"),
            remote: "origin".to_string(),
        });
    }
    Ok(SourceState::Missing {
        name: source.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub name: String,
    pub directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub has_descriptor: bool,
}

/// Enumerate workspaces under the workspaces root, joined with worktree
/// registration and each one's descriptor. Read-only.
pub fn list(root: &Path, cfg: &Config) -> Result<Vec<WorkspaceStatus>> {
    let ws_root = cfg.workspaces_root(root);
    let entries = match std::fs::read_dir(&ws_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let worktrees = git::list_worktrees(root)?;

    let mut statuses = Vec::new();
    for entry in entries {
        let entry = entry?;
        let directory = entry.path();
        if !directory.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let branch = worktrees
            .iter()
            .find(|w| paths::paths_equal(&w.path, &directory))
            .and_then(|w| w.branch.clone());
        let env = WorkspaceEnv::load(&directory).unwrap_or(None);
        statuses.push(WorkspaceStatus {
            name,
            branch,
            port: env.as_ref().and_then(|e| e.port),
            has_descriptor: env.is_some(),
            directory,
        });
    }
    statuses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(statuses)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
