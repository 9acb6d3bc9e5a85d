//! One-time repository setup: the shared root, the catalogue entries inside
//! it, and the ignore rules that keep all of it out of version control.
//!
//! Bootstrap is a migration as much as an initializer. A repository that
//! already carries real `CLAUDE.md` or `.planning` entries gets them moved
//! into the shared root and replaced with links, so their content survives
//! and every future workspace sees it. Running it again is harmless: each
//! entry is inspected and only the missing pieces are filled in.

use crate::config::Config;
use crate::error::Result;
use crate::io;
use crate::links::{self, LinkKind, SharedResourceLink};
use crate::paths;
use serde::Serialize;
use std::path::Path;

const CLAUDE_MD_SEED: &str = "\
# Project Context

Notes that every workspace should see. This file lives in the shared root
and is linked into each workspace, so an edit made anywhere is visible
everywhere at once.
";

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What bootstrap actually did, entry by entry. Idempotent reruns produce a
/// report with every list empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub config_created: bool,
    pub created_dirs: Vec<String>,
    /// Real files or directories moved into the shared root and replaced
    /// with links.
    pub moved: Vec<String>,
    /// Links recreated for targets that already lived in the shared root.
    pub linked: Vec<String>,
    /// Required targets created from scratch.
    pub seeded: Vec<String>,
    /// Entries that exist both in the repository and the shared root; left
    /// untouched for the operator to reconcile.
    pub conflicts: Vec<String>,
    pub gitignore_added: Vec<String>,
}

impl BootstrapReport {
    pub fn changed(&self) -> bool {
        self.config_created
            || !self.created_dirs.is_empty()
            || !self.moved.is_empty()
            || !self.linked.is_empty()
            || !self.seeded.is_empty()
            || !self.gitignore_added.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

pub fn bootstrap(root: &Path, cfg: &Config) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    if !paths::config_path(root).exists() {
        io::ensure_dir(&paths::grove_dir(root))?;
        cfg.save(root)?;
        report.config_created = true;
    }

    let shared = cfg.shared_root(root);
    for (dir, label) in [
        (&shared, cfg.shared_dir.as_str()),
        (&cfg.workspaces_root(root), cfg.workspaces_dir.as_str()),
    ] {
        if !dir.exists() {
            io::ensure_dir(dir)?;
            report.created_dirs.push(label.to_string());
        }
    }

    for entry in links::CATALOGUE {
        migrate_entry(root, &shared, entry, &mut report)?;
    }

    let mut ignore = vec![
        format!("{}/", cfg.workspaces_dir),
        format!("{}/", cfg.shared_dir),
        paths::ENV_FILE.to_string(),
    ];
    // The primary checkout's links would otherwise show up as untracked.
    ignore.extend(links::CATALOGUE.iter().map(|e| e.link_path.to_string()));
    report.gitignore_added = io::ensure_gitignore_entries(root, &ignore)?;

    Ok(report)
}

/// Bring one catalogue entry into its bootstrapped shape: target in the
/// shared root, link at the repository root.
fn migrate_entry(
    root: &Path,
    shared: &Path,
    entry: &SharedResourceLink,
    report: &mut BootstrapReport,
) -> Result<()> {
    let primary = root.join(entry.link_path);
    let target = shared.join(entry.target_path);

    let primary_is_link = primary
        .symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);

    if primary_is_link {
        // Already migrated. A dangling required link means the target was
        // deleted by hand; put it back.
        if entry.required && !target.exists() {
            seed_target(&target, entry)?;
            report.seeded.push(entry.link_path.to_string());
        }
        return Ok(());
    }

    match (primary.exists(), target.exists()) {
        (true, true) => {
            report.conflicts.push(entry.link_path.to_string());
        }
        (true, false) => {
            if let Some(parent) = target.parent() {
                io::ensure_dir(parent)?;
            }
            std::fs::rename(&primary, &target)?;
            link_back(&primary, &target, entry.kind)?;
            report.moved.push(entry.link_path.to_string());
        }
        (false, true) => {
            link_back(&primary, &target, entry.kind)?;
            report.linked.push(entry.link_path.to_string());
        }
        (false, false) => {
            if entry.required {
                seed_target(&target, entry)?;
                link_back(&primary, &target, entry.kind)?;
                report.seeded.push(entry.link_path.to_string());
            }
        }
    }
    Ok(())
}

fn seed_target(target: &Path, entry: &SharedResourceLink) -> Result<()> {
    match entry.kind {
        LinkKind::Dir => io::ensure_dir(target)?,
        LinkKind::File => {
            if let Some(parent) = target.parent() {
                io::ensure_dir(parent)?;
            }
            let seed = if entry.link_path == "CLAUDE.md" {
                CLAUDE_MD_SEED.as_bytes()
            } else {
                &[]
            };
            io::write_if_missing(target, seed)?;
        }
    }
    Ok(())
}

/// Create the repository-root link for an entry whose target is in place.
/// The link stores a relative path, like the per-workspace ones.
fn link_back(primary: &Path, target: &Path, kind: LinkKind) -> Result<()> {
    let parent = match primary.parent() {
        Some(p) => p.to_path_buf(),
        None => return Ok(()),
    };
    io::ensure_dir(&parent)?;
    let rel = links::relative_from(target, &parent);
    links::make_symlink(&rel, primary, kind)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
