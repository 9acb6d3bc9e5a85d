use crate::error::{GroveError, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

pub const GROVE_DIR: &str = ".grove";
pub const CONFIG_FILE: &str = ".grove/config.yaml";

/// Per-workspace environment descriptor, regenerated on every provision.
pub const ENV_FILE: &str = ".grove-env.yaml";

pub const DEFAULT_WORKSPACES_DIR: &str = "workspaces";
pub const DEFAULT_SHARED_DIR: &str = ".shared";
pub const DEFAULT_PRIMARY_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn grove_dir(root: &Path) -> PathBuf {
    root.join(GROVE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn env_path(workspace_dir: &Path) -> PathBuf {
    workspace_dir.join(ENV_FILE)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"))
}

/// A workspace name becomes a directory basename, so it must be a single
/// path component with a conservative charset.
pub fn validate_workspace_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 100 || !name_re().is_match(name) {
        return Err(GroveError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// True when `rel` is a plain repo-relative path: no absolute prefix, no
/// `..`, no current-dir components. Used before copying untracked files
/// between worktrees.
pub fn is_safe_relative(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Path equality that survives symlinked parents (`/tmp` on macOS) and
/// trailing-dot differences. Falls back to literal comparison when either
/// side cannot be canonicalized.
pub(crate) fn paths_equal(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
