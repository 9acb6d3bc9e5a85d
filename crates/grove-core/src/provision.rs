//! The provisioning state machine.
//!
//! `provision` runs a fixed sequence — validate, sync, create, link, port,
//! descriptor — and never reorders it: validation and link planning happen
//! before the repository is touched, the worktree exists before links point
//! into it, links exist before the port is recorded, and the descriptor is
//! written last so its presence marks a completed workspace. Port allocation
//! is the one step allowed to fail without failing the run; everything else
//! aborts in place, leaving whatever was built for a later resume.

use crate::config::Config;
use crate::descriptor::WorkspaceEnv;
use crate::error::{GroveError, Result};
use crate::git;
use crate::inspect::{self, SourceState, WorkspaceSnapshot};
use crate::io;
use crate::links::{self, LinkReport};
use crate::paths;
use crate::ports;
use crate::types::{IncludeChanges, WorkspaceRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionOptions {
    pub include_changes: IncludeChanges,
    /// Permit completing a workspace whose branch or directory already
    /// exists. Which steps actually rerun is decided from the inspected
    /// state, not by the caller.
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PortStatus {
    Assigned { port: u16 },
    /// Resume found a port in the previous descriptor and kept it.
    Reused { port: u16 },
    /// Port allocation is disabled in the config.
    Skipped,
    /// The range was exhausted; the workspace stands without a port.
    Exhausted { attempts: u32 },
}

impl PortStatus {
    pub fn port(&self) -> Option<u16> {
        match self {
            PortStatus::Assigned { port } | PortStatus::Reused { port } => Some(*port),
            PortStatus::Skipped | PortStatus::Exhausted { .. } => None,
        }
    }
}

/// What `include_changes` actually carried over from the source checkout.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChangeSummary {
    pub patch_applied: bool,
    pub untracked_copied: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceRecord {
    pub name: String,
    pub branch: String,
    pub source: String,
    pub directory: PathBuf,
    pub links: LinkReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub record: WorkspaceRecord,
    /// True when an existing branch or directory was completed rather than
    /// created from scratch.
    pub resumed: bool,
    pub port_status: PortStatus,
    pub changes: ChangeSummary,
}

// ---------------------------------------------------------------------------
// Mode decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Neither branch nor directory exist: create both.
    Fresh,
    /// Branch exists with no worktree anywhere: check it out into place.
    Attach,
    /// Branch is already checked out at our directory: redo only the
    /// idempotent tail (links, port, descriptor).
    Resume,
}

fn decide_mode(snapshot: &WorkspaceSnapshot, resume: bool) -> Result<Mode> {
    match (snapshot.branch_exists, snapshot.directory_exists) {
        (false, false) => Ok(Mode::Fresh),
        (false, true) => Err(GroveError::DirectoryExists(snapshot.directory.clone())),
        (true, true) => {
            if !resume {
                return Err(GroveError::BranchExists {
                    branch: snapshot.branch.clone(),
                    directory: Some(snapshot.directory.clone()),
                });
            }
            match &snapshot.worktree_for_branch {
                Some(at) if paths::paths_equal(at, &snapshot.directory) => Ok(Mode::Resume),
                // The directory holds something other than our branch's
                // worktree; completing it would clobber unknown state.
                _ => Err(GroveError::DirectoryExists(snapshot.directory.clone())),
            }
        }
        (true, false) => {
            // Only a live checkout elsewhere keeps the branch busy; a
            // registration whose directory is gone is stale and prunable.
            if let Some(at) = &snapshot.worktree_for_branch {
                if at.exists() {
                    return Err(GroveError::BranchExists {
                        branch: snapshot.branch.clone(),
                        directory: None,
                    });
                }
            }
            if resume {
                Ok(Mode::Attach)
            } else {
                Err(GroveError::DanglingBranchNoDirectory(snapshot.branch.clone()))
            }
        }
    }
}

/// Where the new branch forks from. `none` keeps unpushed commits behind by
/// preferring the source's upstream; every other mode forks from the source
/// ref itself.
fn fork_point(source: &SourceState, include: IncludeChanges) -> Result<String> {
    match source {
        SourceState::Remote { refname, .. } => Ok(refname.clone()),
        SourceState::Local {
            branch, upstream, ..
        } => match include {
            IncludeChanges::None => Ok(upstream.clone().unwrap_or_else(|| branch.clone())),
            _ => Ok(branch.clone()),
        },
        SourceState::Missing { name } => Err(GroveError::SourceNotFound(name.clone())),
    }
}

// ---------------------------------------------------------------------------
// Provision
// ---------------------------------------------------------------------------

pub fn provision(
    root: &Path,
    cfg: &Config,
    request: &WorkspaceRequest,
    opts: &ProvisionOptions,
) -> Result<ProvisionOutcome> {
    // -- validate -----------------------------------------------------------
    git::ensure_git()?;
    paths::validate_workspace_name(&request.name)?;
    if !git::branch_name_ok(root, &request.branch)? {
        return Err(GroveError::InvalidBranch(request.branch.clone()));
    }
    let snapshot = inspect::inspect(root, cfg, request)?;
    if let SourceState::Missing { name } = &snapshot.source {
        return Err(GroveError::SourceNotFound(name.clone()));
    }
    // Planned before any mutation: a missing shared target fails the run
    // with the repository untouched.
    let plan = links::plan(root, cfg, &snapshot.directory)?;
    let mode = decide_mode(&snapshot, opts.resume)?;

    // -- sync ---------------------------------------------------------------
    if let SourceState::Remote { remote, .. } = &snapshot.source {
        git::fetch(root, remote)?;
    }
    let start = fork_point(&snapshot.source, opts.include_changes)?;

    // -- create -------------------------------------------------------------
    io::ensure_dir(&cfg.workspaces_root(root))?;
    match mode {
        Mode::Fresh => {
            git::worktree_add_new_branch(root, &snapshot.directory, &request.branch, &start)?;
        }
        Mode::Attach => {
            // A leftover registration from a deleted checkout would make
            // the add refuse the branch.
            git::worktree_prune(root)?;
            git::worktree_add_existing(root, &snapshot.directory, &request.branch)?;
        }
        Mode::Resume => {}
    }

    let mut changes = ChangeSummary::default();
    if mode == Mode::Fresh && opts.include_changes.carries_working_tree() {
        if let SourceState::Local {
            checked_out_at: Some(source_dir),
            ..
        } = &snapshot.source
        {
            changes = carry_working_tree(source_dir, &snapshot.directory)?;
        }
    }

    // -- link ---------------------------------------------------------------
    let link_report = links::apply(&plan)?;

    // -- port ---------------------------------------------------------------
    // A previous descriptor only matters on resume; if it is unreadable the
    // whole file gets regenerated below anyway.
    let previous = match mode {
        Mode::Resume => WorkspaceEnv::load(&snapshot.directory).ok().flatten(),
        _ => None,
    };
    let port_status = resolve_port(root, cfg, &request.name, previous.as_ref())?;

    // -- descriptor ---------------------------------------------------------
    let created_at = Utc::now();
    let port = port_status.port();
    let env = WorkspaceEnv {
        version: 1,
        workspace: request.name.clone(),
        branch: request.branch.clone(),
        port,
        base_url: port.map(ports::base_url),
        shared_root: links::relative_from(&cfg.shared_root(root), &snapshot.directory),
        repo_root: links::relative_from(root, &snapshot.directory),
        created_at,
    };
    env.save(&snapshot.directory)?;

    Ok(ProvisionOutcome {
        record: WorkspaceRecord {
            name: request.name.clone(),
            branch: request.branch.clone(),
            source: request.source_branch.clone(),
            directory: snapshot.directory,
            links: link_report,
            port,
            created_at,
        },
        resumed: mode != Mode::Fresh,
        port_status,
        changes,
    })
}

/// Port step. Exhaustion degrades the outcome instead of failing it; any
/// other allocator error still aborts.
fn resolve_port(
    root: &Path,
    cfg: &Config,
    workspace: &str,
    previous: Option<&WorkspaceEnv>,
) -> Result<PortStatus> {
    if !cfg.ports.enabled {
        return Ok(PortStatus::Skipped);
    }
    if let Some(port) = previous.and_then(|env| env.port) {
        return Ok(PortStatus::Reused { port });
    }
    let used = ports::used_ports(root, cfg)?;
    match ports::allocate(cfg, workspace, &used) {
        Ok(assignment) => Ok(PortStatus::Assigned {
            port: assignment.port,
        }),
        Err(GroveError::PortExhausted { attempts, .. }) => Ok(PortStatus::Exhausted { attempts }),
        Err(e) => Err(e),
    }
}

/// Copy the source checkout's dirty state into the new worktree: staged and
/// unstaged changes travel as one binary patch, untracked files are copied
/// one by one. The source checkout is never modified.
fn carry_working_tree(source_dir: &Path, dest_dir: &Path) -> Result<ChangeSummary> {
    let mut summary = ChangeSummary::default();

    let patch = git::diff_binary_head(source_dir)?;
    if !patch.is_empty() {
        git::apply_patch(dest_dir, &patch)?;
        summary.patch_applied = true;
    }

    for rel in git::untracked_files(source_dir)? {
        if !paths::is_safe_relative(&rel) {
            continue;
        }
        let from = source_dir.join(&rel);
        let to = dest_dir.join(&rel);
        if to.exists() || !from.is_file() {
            continue;
        }
        if let Some(parent) = to.parent() {
            io::ensure_dir(parent)?;
        }
        std::fs::copy(&from, &to)?;
        summary.untracked_copied += 1;
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Standalone port assignment
// ---------------------------------------------------------------------------

/// Allocate a port for an existing workspace and rewrite its descriptor,
/// for workspaces provisioned while the range was exhausted or with ports
/// disabled. Unlike the provisioning step, exhaustion here is a real error:
/// the caller asked for a port specifically.
///
/// The primary branch's checkout is the repository root, not a directory
/// under the workspaces root, so asking for the primary name targets the
/// root and records the fixed port there.
pub fn assign_port(root: &Path, cfg: &Config, name: &str) -> Result<ports::PortAssignment> {
    git::ensure_git()?;
    paths::validate_workspace_name(name)?;
    let workspace_dir = cfg.workspace_dir(root, name);
    let directory = if workspace_dir.is_dir() {
        workspace_dir
    } else if cfg.is_primary(name) {
        root.to_path_buf()
    } else {
        return Err(GroveError::WorkspaceNotFound(name.to_string()));
    };

    let previous = WorkspaceEnv::load(&directory)?;
    let used = ports::used_ports(root, cfg)?;
    let assignment = ports::allocate(cfg, name, &used)?;

    let branch = match &previous {
        Some(env) => env.branch.clone(),
        None => git::current_branch(&directory)?.unwrap_or_else(|| name.to_string()),
    };
    let env = WorkspaceEnv {
        version: 1,
        workspace: name.to_string(),
        branch,
        port: Some(assignment.port),
        base_url: Some(assignment.base_url.clone()),
        shared_root: links::relative_from(&cfg.shared_root(root), &directory),
        repo_root: links::relative_from(root, &directory),
        created_at: match &previous {
            Some(env) => env.created_at,
            None => Utc::now(),
        },
    };
    env.save(&directory)?;
    Ok(assignment)
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RemoveReport {
    pub name: String,
    pub directory: PathBuf,
    pub removed_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_branch: Option<String>,
}

/// Tear a workspace down: drop the worktree (or bare directory), prune the
/// registration, and optionally delete the branch that was checked out
/// there.
pub fn remove(root: &Path, cfg: &Config, name: &str, delete_branch: bool) -> Result<RemoveReport> {
    git::ensure_git()?;
    paths::validate_workspace_name(name)?;
    let directory = cfg.workspace_dir(root, name);

    // Resolve the branch before the worktree disappears.
    let branch = git::list_worktrees(root)?
        .into_iter()
        .find(|w| paths::paths_equal(&w.path, &directory))
        .and_then(|w| w.branch);

    let directory_exists = directory.exists();
    if !directory_exists && branch.is_none() && !git::branch_exists(root, name)? {
        return Err(GroveError::WorkspaceNotFound(name.to_string()));
    }

    let mut removed_directory = false;
    if directory_exists {
        if !git::worktree_remove(root, &directory)? {
            // Not registered as a worktree; plain directory removal.
            std::fs::remove_dir_all(&directory)?;
        }
        removed_directory = true;
    }
    git::worktree_prune(root)?;

    let mut deleted_branch = None;
    if delete_branch {
        let candidate = branch.unwrap_or_else(|| name.to_string());
        if git::branch_exists(root, &candidate)? {
            git::branch_delete(root, &candidate)?;
            deleted_branch = Some(candidate);
        }
    }

    Ok(RemoveReport {
        name: name.to_string(),
        directory,
        removed_directory,
        deleted_branch,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bootstrapped_repo, commit_all, run_git};
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn request(name: &str) -> WorkspaceRequest {
        WorkspaceRequest::new(name, None, "main")
    }

    fn resume_opts() -> ProvisionOptions {
        ProvisionOptions {
            resume: true,
            ..ProvisionOptions::default()
        }
    }

    fn rev(dir: &std::path::Path, what: &str) -> String {
        git::run_checked(dir, &["rev-parse", what], "rev-parse").unwrap()
    }

    #[test]
    fn fresh_provision_creates_everything() {
        let dir = TempDir::new().unwrap();
        let mut cfg = bootstrapped_repo(dir.path());
        cfg.ports.range_start = 48100;
        cfg.ports.range_end = 48199;

        let out = provision(
            dir.path(),
            &cfg,
            &request("issue-42"),
            &ProvisionOptions::default(),
        )
        .unwrap();

        assert!(!out.resumed);
        let ws = cfg.workspace_dir(dir.path(), "issue-42");
        assert!(ws.is_dir());
        assert!(git::branch_exists(dir.path(), "issue-42").unwrap());
        assert!(ws.join("CLAUDE.md").exists());
        assert!(ws.join(".planning").is_dir());
        assert_eq!(out.record.links.total(), out.record.links.created.len());

        let env = WorkspaceEnv::load(&ws).unwrap().unwrap();
        assert_eq!(env.workspace, "issue-42");
        let port = env.port.unwrap();
        assert!((48100..=48199).contains(&port));
        assert_eq!(out.port_status, PortStatus::Assigned { port });
        assert_eq!(env.base_url, Some(format!("http://localhost:{port}")));
    }

    #[test]
    fn branch_defaults_to_name_but_can_differ() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        let req = WorkspaceRequest::new("issue-9", Some("fix/parser".into()), "main");
        provision(dir.path(), &cfg, &req, &ProvisionOptions::default()).unwrap();

        assert!(git::branch_exists(dir.path(), "fix/parser").unwrap());
        assert!(!git::branch_exists(dir.path(), "issue-9").unwrap());
        let ws = cfg.workspace_dir(dir.path(), "issue-9");
        assert_eq!(
            git::current_branch(&ws).unwrap().as_deref(),
            Some("fix/parser")
        );
    }

    #[test]
    fn repeat_without_resume_is_a_collision() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        provision(
            dir.path(),
            &cfg,
            &request("dup"),
            &ProvisionOptions::default(),
        )
        .unwrap();

        let err = provision(
            dir.path(),
            &cfg,
            &request("dup"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::BranchExists { .. }), "{err}");
        // Both facts in one message: the branch and the occupied directory.
        let ws = cfg.workspace_dir(dir.path(), "dup");
        assert!(err.to_string().contains(&ws.display().to_string()), "{err}");
    }

    #[test]
    fn occupied_directory_without_branch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        std::fs::create_dir_all(cfg.workspace_dir(dir.path(), "squatter")).unwrap();

        let err = provision(
            dir.path(),
            &cfg,
            &request("squatter"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::DirectoryExists(_)), "{err}");
    }

    #[test]
    fn missing_source_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        let req = WorkspaceRequest::new("w", None, "ghost");
        let err = provision(dir.path(), &cfg, &req, &ProvisionOptions::default()).unwrap_err();
        assert!(matches!(err, GroveError::SourceNotFound(_)), "{err}");
        assert!(!git::branch_exists(dir.path(), "w").unwrap());
        assert!(!cfg.workspace_dir(dir.path(), "w").exists());
    }

    #[test]
    fn missing_shared_target_blocks_before_any_mutation() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        std::fs::remove_file(cfg.shared_root(dir.path()).join("CLAUDE.md")).unwrap();

        let err = provision(
            dir.path(),
            &cfg,
            &request("blocked"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::LinkTargetMissing(_)), "{err}");
        assert!(!git::branch_exists(dir.path(), "blocked").unwrap());
        assert!(!cfg.workspace_dir(dir.path(), "blocked").exists());
    }

    #[test]
    fn dangling_branch_requires_resume_to_attach() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        run_git(dir.path(), &["branch", "orphan", "main"]);

        let err = provision(
            dir.path(),
            &cfg,
            &request("orphan"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::DanglingBranchNoDirectory(_)), "{err}");

        let out = provision(dir.path(), &cfg, &request("orphan"), &resume_opts()).unwrap();
        assert!(out.resumed);
        let ws = cfg.workspace_dir(dir.path(), "orphan");
        assert_eq!(git::current_branch(&ws).unwrap().as_deref(), Some("orphan"));
        assert!(ws.join("CLAUDE.md").exists());
        assert!(WorkspaceEnv::load(&ws).unwrap().is_some());
    }

    #[test]
    fn branch_checked_out_elsewhere_stays_a_collision_even_with_resume() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let elsewhere = dir.path().join("elsewhere");
        git::worktree_add_new_branch(dir.path(), &elsewhere, "busy", "main").unwrap();

        let err = provision(dir.path(), &cfg, &request("busy"), &resume_opts()).unwrap_err();
        assert!(
            matches!(err, GroveError::BranchExists { directory: None, .. }),
            "{err}"
        );
    }

    #[test]
    fn resume_reattaches_after_the_directory_was_deleted() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        provision(
            dir.path(),
            &cfg,
            &request("lost"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        let ws = cfg.workspace_dir(dir.path(), "lost");
        std::fs::remove_dir_all(&ws).unwrap();
        // The registration outlives the deleted checkout until a prune runs.
        assert!(git::find_worktree_for_branch(dir.path(), "lost")
            .unwrap()
            .is_some());

        let err = provision(
            dir.path(),
            &cfg,
            &request("lost"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::DanglingBranchNoDirectory(_)), "{err}");

        let out = provision(dir.path(), &cfg, &request("lost"), &resume_opts()).unwrap();
        assert!(out.resumed);
        assert_eq!(git::current_branch(&ws).unwrap().as_deref(), Some("lost"));
        assert!(ws.join("CLAUDE.md").exists());
        assert!(WorkspaceEnv::load(&ws).unwrap().is_some());
    }

    #[test]
    fn resume_completes_a_partial_workspace() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        // A run that died after the create step: worktree present, links,
        // port and descriptor missing.
        let ws = cfg.workspace_dir(dir.path(), "half");
        git::worktree_add_new_branch(dir.path(), &ws, "half", "main").unwrap();
        assert!(!ws.join("CLAUDE.md").exists());

        let out = provision(dir.path(), &cfg, &request("half"), &resume_opts()).unwrap();
        assert!(out.resumed);
        assert!(ws.join("CLAUDE.md").exists());
        assert!(ws.join(".scratch").is_dir());
        assert!(WorkspaceEnv::load(&ws).unwrap().is_some());
    }

    #[test]
    fn resume_applies_only_missing_links() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let out = provision(
            dir.path(),
            &cfg,
            &request("relink"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        let ws = cfg.workspace_dir(dir.path(), "relink");
        std::fs::remove_file(ws.join("CLAUDE.md")).unwrap();

        let again = provision(dir.path(), &cfg, &request("relink"), &resume_opts()).unwrap();
        assert_eq!(again.record.links.created, vec!["CLAUDE.md".to_string()]);
        assert_eq!(
            again.record.links.existing.len(),
            out.record.links.total() - 1
        );
    }

    #[test]
    fn resume_reuses_the_recorded_port() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let first = provision(
            dir.path(),
            &cfg,
            &request("sticky"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        let port = first.record.port.unwrap();

        let second = provision(dir.path(), &cfg, &request("sticky"), &resume_opts()).unwrap();
        assert_eq!(second.port_status, PortStatus::Reused { port });
        let ws = cfg.workspace_dir(dir.path(), "sticky");
        assert_eq!(WorkspaceEnv::load(&ws).unwrap().unwrap().port, Some(port));
    }

    #[test]
    fn sequential_workspaces_get_distinct_ports() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        let a = provision(dir.path(), &cfg, &request("a"), &ProvisionOptions::default()).unwrap();
        let b = provision(dir.path(), &cfg, &request("b"), &ProvisionOptions::default()).unwrap();
        let c = provision(dir.path(), &cfg, &request("c"), &ProvisionOptions::default()).unwrap();
        let ports: Vec<_> = [&a, &b, &c]
            .iter()
            .map(|o| o.record.port.unwrap())
            .collect();
        assert_eq!(ports.len(), 3);
        assert!(ports[0] != ports[1] && ports[1] != ports[2] && ports[0] != ports[2]);
    }

    #[test]
    fn primary_workspace_gets_the_fixed_port() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        // Named like the primary branch; the branch itself is taken, so a
        // different one is requested.
        let req = WorkspaceRequest::new("main", Some("main-copy".into()), "main");
        let out = provision(dir.path(), &cfg, &req, &ProvisionOptions::default()).unwrap();
        assert_eq!(out.record.port, Some(cfg.ports.primary));
    }

    #[test]
    fn port_exhaustion_is_a_degraded_success() {
        let dir = TempDir::new().unwrap();
        let mut cfg = bootstrapped_repo(dir.path());
        let holder = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = holder.local_addr().unwrap().port();
        cfg.ports.range_start = taken;
        cfg.ports.range_end = taken;
        cfg.ports.max_attempts = 5;

        let out = provision(
            dir.path(),
            &cfg,
            &request("portless"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        assert_eq!(out.port_status, PortStatus::Exhausted { attempts: 5 });
        assert!(out.record.port.is_none());
        let ws = cfg.workspace_dir(dir.path(), "portless");
        assert!(ws.join("CLAUDE.md").exists());
        let env = WorkspaceEnv::load(&ws).unwrap().unwrap();
        assert!(env.port.is_none());
        assert!(env.base_url.is_none());
        drop(holder);
    }

    #[test]
    fn disabled_ports_skip_allocation() {
        let dir = TempDir::new().unwrap();
        let mut cfg = bootstrapped_repo(dir.path());
        cfg.ports.enabled = false;

        let out = provision(
            dir.path(),
            &cfg,
            &request("noport"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        assert_eq!(out.port_status, PortStatus::Skipped);
        let env = WorkspaceEnv::load(&cfg.workspace_dir(dir.path(), "noport"))
            .unwrap()
            .unwrap();
        assert!(env.port.is_none());
    }

    #[test]
    fn uncommitted_mode_carries_the_dirty_working_tree() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        std::fs::write(dir.path().join("README.md"), "# edited\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "untracked\n").unwrap();

        let opts = ProvisionOptions {
            include_changes: IncludeChanges::Uncommitted,
            resume: false,
        };
        let out = provision(dir.path(), &cfg, &request("carry"), &opts).unwrap();
        assert!(out.changes.patch_applied);
        assert_eq!(out.changes.untracked_copied, 1);

        let ws = cfg.workspace_dir(dir.path(), "carry");
        assert_eq!(
            std::fs::read_to_string(ws.join("README.md")).unwrap(),
            "# edited\n"
        );
        assert_eq!(
            std::fs::read_to_string(ws.join("notes.txt")).unwrap(),
            "untracked\n"
        );
        // Source checkout is untouched.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# edited\n"
        );
        assert!(git::has_uncommitted(dir.path()).unwrap());
    }

    #[test]
    fn default_mode_leaves_dirty_state_behind() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        std::fs::write(dir.path().join("README.md"), "# edited\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "untracked\n").unwrap();

        let out = provision(
            dir.path(),
            &cfg,
            &request("clean"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        assert!(!out.changes.patch_applied);
        assert_eq!(out.changes.untracked_copied, 0);

        let ws = cfg.workspace_dir(dir.path(), "clean");
        assert_ne!(
            std::fs::read_to_string(ws.join("README.md")).unwrap(),
            "# edited\n"
        );
        assert!(!ws.join("notes.txt").exists());
    }

    #[test]
    fn none_forks_from_upstream_and_unpushed_forks_from_the_branch() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let remote = TempDir::new().unwrap();
        run_git(remote.path(), &["init", "--bare", "--quiet"]);
        run_git(
            dir.path(),
            &["remote", "add", "origin", remote.path().to_str().unwrap()],
        );
        run_git(dir.path(), &["push", "--quiet", "-u", "origin", "main"]);
        std::fs::write(dir.path().join("local.txt"), "local\n").unwrap();
        commit_all(dir.path(), "local only commit");

        let behind = provision(
            dir.path(),
            &cfg,
            &request("behind"),
            &ProvisionOptions::default(),
        )
        .unwrap();
        let ahead_opts = ProvisionOptions {
            include_changes: IncludeChanges::Unpushed,
            resume: false,
        };
        let ahead = provision(dir.path(), &cfg, &request("ahead"), &ahead_opts).unwrap();

        assert_eq!(
            rev(&behind.record.directory, "HEAD"),
            rev(dir.path(), "origin/main")
        );
        assert_eq!(
            rev(&ahead.record.directory, "HEAD"),
            rev(dir.path(), "main")
        );
        assert_ne!(rev(dir.path(), "main"), rev(dir.path(), "origin/main"));
    }

    #[test]
    fn invalid_names_and_branches_are_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        let err = provision(
            dir.path(),
            &cfg,
            &WorkspaceRequest::new("../escape", None, "main"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::InvalidName(_)), "{err}");

        let err = provision(
            dir.path(),
            &cfg,
            &WorkspaceRequest::new("ok", Some("bad..branch".into()), "main"),
            &ProvisionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GroveError::InvalidBranch(_)), "{err}");
    }

    #[test]
    fn remove_tears_down_worktree_and_optionally_branch() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        provision(
            dir.path(),
            &cfg,
            &request("doomed"),
            &ProvisionOptions::default(),
        )
        .unwrap();

        let report = remove(dir.path(), &cfg, "doomed", false).unwrap();
        assert!(report.removed_directory);
        assert!(report.deleted_branch.is_none());
        assert!(!cfg.workspace_dir(dir.path(), "doomed").exists());
        assert!(git::branch_exists(dir.path(), "doomed").unwrap());
        assert!(git::find_worktree_for_branch(dir.path(), "doomed")
            .unwrap()
            .is_none());

        // Directory is gone but the branch lingers; remove can still finish
        // the job.
        let report = remove(dir.path(), &cfg, "doomed", true).unwrap();
        assert!(!report.removed_directory);
        assert_eq!(report.deleted_branch.as_deref(), Some("doomed"));
        assert!(!git::branch_exists(dir.path(), "doomed").unwrap());
    }

    #[test]
    fn remove_deletes_the_branch_the_worktree_held() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let req = WorkspaceRequest::new("named", Some("fix/other".into()), "main");
        provision(dir.path(), &cfg, &req, &ProvisionOptions::default()).unwrap();

        let report = remove(dir.path(), &cfg, "named", true).unwrap();
        assert_eq!(report.deleted_branch.as_deref(), Some("fix/other"));
        assert!(!git::branch_exists(dir.path(), "fix/other").unwrap());
    }

    #[test]
    fn assign_port_fills_in_a_portless_workspace() {
        let dir = TempDir::new().unwrap();
        let mut cfg = bootstrapped_repo(dir.path());
        cfg.ports.enabled = false;
        provision(
            dir.path(),
            &cfg,
            &request("latecomer"),
            &ProvisionOptions::default(),
        )
        .unwrap();

        cfg.ports.enabled = true;
        cfg.ports.range_start = 48300;
        cfg.ports.range_end = 48399;
        let assignment = assign_port(dir.path(), &cfg, "latecomer").unwrap();
        assert!((48300..=48399).contains(&assignment.port));

        let ws = cfg.workspace_dir(dir.path(), "latecomer");
        let env = WorkspaceEnv::load(&ws).unwrap().unwrap();
        assert_eq!(env.port, Some(assignment.port));
        assert_eq!(env.branch, "latecomer");
    }

    #[test]
    fn assign_port_requires_the_workspace_directory() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let err = assign_port(dir.path(), &cfg, "absent").unwrap_err();
        assert!(matches!(err, GroveError::WorkspaceNotFound(_)), "{err}");
    }

    #[test]
    fn assign_port_primary_targets_the_root_checkout() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());

        let assignment = assign_port(dir.path(), &cfg, "main").unwrap();
        assert_eq!(assignment.port, cfg.ports.primary);

        // The descriptor lands at the repository root, not under workspaces/.
        let env = WorkspaceEnv::load(dir.path()).unwrap().unwrap();
        assert_eq!(env.workspace, "main");
        assert_eq!(env.branch, "main");
        assert_eq!(env.port, Some(cfg.ports.primary));
        assert_eq!(env.shared_root, PathBuf::from(".shared"));
        assert_eq!(env.repo_root, PathBuf::from("."));
    }

    #[test]
    fn assign_port_surfaces_exhaustion() {
        let dir = TempDir::new().unwrap();
        let mut cfg = bootstrapped_repo(dir.path());
        provision(
            dir.path(),
            &cfg,
            &request("starved"),
            &ProvisionOptions::default(),
        )
        .unwrap();

        let holder = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = holder.local_addr().unwrap().port();
        cfg.ports.range_start = taken;
        cfg.ports.range_end = taken;
        cfg.ports.max_attempts = 3;
        let err = assign_port(dir.path(), &cfg, "starved").unwrap_err();
        assert!(matches!(err, GroveError::PortExhausted { .. }), "{err}");
        drop(holder);
    }

    #[test]
    fn remove_unknown_workspace_errors() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let err = remove(dir.path(), &cfg, "nothing", false).unwrap_err();
        assert!(matches!(err, GroveError::WorkspaceNotFound(_)), "{err}");
    }

    #[test]
    fn remove_handles_unregistered_directories() {
        let dir = TempDir::new().unwrap();
        let cfg = bootstrapped_repo(dir.path());
        let ws = cfg.workspace_dir(dir.path(), "plain");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("junk.txt"), "x").unwrap();

        let report = remove(dir.path(), &cfg, "plain", false).unwrap();
        assert!(report.removed_directory);
        assert!(!ws.exists());
    }
}
