//! Shared-resource link planning and application.
//!
//! Workspaces get their non-versioned resources (agent context, planning
//! notes, scratch space) as symlinks into the shared root, so every
//! workspace sees the same files. Planning is separated from application:
//! a plan is computed and validated before any directory or branch exists,
//! and applying it is idempotent so a resumed provision skips links that
//! are already correct.

use crate::config::Config;
use crate::error::{GroveError, LinkFailure, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    File,
    Dir,
}

/// One entry of the fixed catalogue: a path inside every workspace that
/// must point at a path inside the shared root.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SharedResourceLink {
    /// Relative to the workspace root.
    pub link_path: &'static str,
    /// Relative to the shared root.
    pub target_path: &'static str,
    pub kind: LinkKind,
    /// Required targets must exist at plan time; optional ones are skipped
    /// when absent.
    pub required: bool,
}

/// Links are made at the shallowest level that works. `.claude/` is the
/// exception: it also holds workspace-local files, so it stays a real
/// directory and only selected children are linked.
pub const CATALOGUE: &[SharedResourceLink] = &[
    SharedResourceLink {
        link_path: "CLAUDE.md",
        target_path: "CLAUDE.md",
        kind: LinkKind::File,
        required: true,
    },
    SharedResourceLink {
        link_path: "CLAUDE_CONTEXT.md",
        target_path: "CLAUDE_CONTEXT.md",
        kind: LinkKind::File,
        required: false,
    },
    SharedResourceLink {
        link_path: ".planning",
        target_path: ".planning",
        kind: LinkKind::Dir,
        required: true,
    },
    SharedResourceLink {
        link_path: ".scratch",
        target_path: ".scratch",
        kind: LinkKind::Dir,
        required: true,
    },
    SharedResourceLink {
        link_path: ".claude/settings.local.json",
        target_path: ".claude/settings.local.json",
        kind: LinkKind::File,
        required: false,
    },
    SharedResourceLink {
        link_path: ".claude/skills",
        target_path: ".claude/skills",
        kind: LinkKind::Dir,
        required: false,
    },
    SharedResourceLink {
        link_path: ".claude/agents",
        target_path: ".claude/agents",
        kind: LinkKind::Dir,
        required: false,
    },
];

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlannedLink {
    /// Catalogue link path, used in reports.
    pub name: String,
    /// Absolute path of the symlink to create.
    pub link: PathBuf,
    /// Relative target to store in the symlink, so the repository survives
    /// being moved or mounted elsewhere.
    pub target: PathBuf,
    /// Absolute target, for validation and messages.
    pub target_abs: PathBuf,
    pub kind: LinkKind,
}

/// Relative path from `base` (a directory) to `target`, computed lexically.
/// Both must be built from the same root prefix.
pub(crate) fn relative_from(target: &Path, base: &Path) -> PathBuf {
    let target_comps: Vec<Component> = target.components().collect();
    let base_comps: Vec<Component> = base.components().collect();
    let mut common = 0;
    while common < target_comps.len()
        && common < base_comps.len()
        && target_comps[common] == base_comps[common]
    {
        common += 1;
    }
    let mut rel = PathBuf::new();
    for _ in common..base_comps.len() {
        rel.push("..");
    }
    for comp in &target_comps[common..] {
        rel.push(comp.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Compute the full link plan for a workspace directory.
///
/// Fails with [`GroveError::LinkTargetMissing`] when the shared root or any
/// required target is absent, before anything has been created: a broken
/// bootstrap surfaces as a precondition error, not a half-linked workspace.
pub fn plan(root: &Path, cfg: &Config, workspace_dir: &Path) -> Result<Vec<PlannedLink>> {
    let shared = cfg.shared_root(root);
    if !shared.is_dir() {
        return Err(GroveError::LinkTargetMissing(shared));
    }

    let mut planned = Vec::new();
    for entry in CATALOGUE {
        let target_abs = shared.join(entry.target_path);
        if !target_abs.exists() {
            if entry.required {
                return Err(GroveError::LinkTargetMissing(target_abs));
            }
            continue;
        }
        let link = workspace_dir.join(entry.link_path);
        let base = match link.parent() {
            Some(p) => p.to_path_buf(),
            None => workspace_dir.to_path_buf(),
        };
        planned.push(PlannedLink {
            name: entry.link_path.to_string(),
            link,
            target: relative_from(&target_abs, &base),
            target_abs,
            kind: entry.kind,
        });
    }
    Ok(planned)
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

impl LinkReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.existing.len()
    }
}

enum Disposition {
    Created,
    AlreadyCorrect,
}

/// Apply a plan. Every entry is attempted even after one fails, so the
/// error lists exactly which links exist and which do not.
pub fn apply(plan: &[PlannedLink]) -> Result<LinkReport> {
    let mut report = LinkReport::default();
    let mut failed: Vec<LinkFailure> = Vec::new();

    for planned in plan {
        match apply_one(planned) {
            Ok(Disposition::Created) => report.created.push(planned.name.clone()),
            Ok(Disposition::AlreadyCorrect) => report.existing.push(planned.name.clone()),
            Err(reason) => failed.push(LinkFailure {
                link: planned.name.clone(),
                reason,
            }),
        }
    }

    if !failed.is_empty() {
        let mut applied = report.created;
        applied.extend(report.existing);
        return Err(GroveError::PartialLinkFailure { applied, failed });
    }
    Ok(report)
}

fn apply_one(planned: &PlannedLink) -> std::result::Result<Disposition, String> {
    if let Some(parent) = planned.link.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("creating parent: {e}"))?;
    }
    match std::fs::symlink_metadata(&planned.link) {
        Ok(md) if md.file_type().is_symlink() => {
            let current = std::fs::read_link(&planned.link).map_err(|e| e.to_string())?;
            if current == planned.target {
                Ok(Disposition::AlreadyCorrect)
            } else {
                Err(format!(
                    "symlink points at {}, expected {}",
                    current.display(),
                    planned.target.display()
                ))
            }
        }
        Ok(_) => Err("exists and is not a symlink".to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Target may have vanished between plan and apply.
            if !planned.target_abs.exists() {
                return Err(format!("target missing: {}", planned.target_abs.display()));
            }
            make_symlink(&planned.target, &planned.link, planned.kind)
                .map_err(|e| e.to_string())?;
            Ok(Disposition::Created)
        }
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(unix)]
pub(crate) fn make_symlink(target: &Path, link: &Path, _kind: LinkKind) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn make_symlink(target: &Path, link: &Path, kind: LinkKind) -> std::io::Result<()> {
    match kind {
        LinkKind::Dir => std::os::windows::fs::symlink_dir(target, link),
        LinkKind::File => std::os::windows::fs::symlink_file(target, link),
    }
}

// ---------------------------------------------------------------------------
// Survey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Symlink in place with the expected target.
    Ok,
    /// Nothing at the link path.
    Missing,
    /// A symlink pointing somewhere else.
    WrongTarget,
    /// A real file or directory sits where the link should be.
    NotALink,
    /// The shared target is gone (dangling link, or an un-bootstrapped
    /// required entry).
    TargetMissing,
    /// Optional entry with no shared target and no link; nothing to do.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    pub name: String,
    /// The relative target a correct link would hold.
    pub target: PathBuf,
    pub required: bool,
    pub state: LinkState,
}

/// Read-only counterpart of [`apply`]: the current state of every catalogue
/// entry in `workspace_dir`, including ones [`plan`] would refuse to plan.
pub fn survey(root: &Path, cfg: &Config, workspace_dir: &Path) -> Vec<LinkStatus> {
    let shared = cfg.shared_root(root);
    CATALOGUE
        .iter()
        .map(|entry| {
            let target_abs = shared.join(entry.target_path);
            let link = workspace_dir.join(entry.link_path);
            let base = match link.parent() {
                Some(p) => p.to_path_buf(),
                None => workspace_dir.to_path_buf(),
            };
            let expected = relative_from(&target_abs, &base);
            let link_meta = std::fs::symlink_metadata(&link);

            let state = if !target_abs.exists() {
                match link_meta {
                    Err(_) if !entry.required => LinkState::Skipped,
                    _ => LinkState::TargetMissing,
                }
            } else {
                match link_meta {
                    Ok(md) if md.file_type().is_symlink() => {
                        match std::fs::read_link(&link) {
                            Ok(current) if current == expected => LinkState::Ok,
                            _ => LinkState::WrongTarget,
                        }
                    }
                    Ok(_) => LinkState::NotALink,
                    Err(_) => LinkState::Missing,
                }
            };
            LinkStatus {
                name: entry.link_path.to_string(),
                target: expected,
                required: entry.required,
                state,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
