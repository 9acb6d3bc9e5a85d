use grove_core::{git, paths};
use std::path::{Path, PathBuf};

/// Resolve the repository root all other paths hang off.
///
/// Priority:
/// 1. `--root` flag / `GROVE_ROOT` env var (passed in as `explicit`)
/// 2. The git common root. Inside a linked worktree this resolves to the
///    primary checkout, which is where `.grove/`, the shared root, and the
///    workspaces root live. This must run before the marker walk:
///    `.grove/config.yaml` is tracked, so every workspace contains one and
///    walking up from inside a workspace would stop at the workspace itself.
/// 3. Walk upward from `cwd` looking for `.grove/`
/// 4. Walk upward from `cwd` looking for `.git/`
/// 5. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(root) = git::common_root(&cwd) {
        return root;
    }

    if let Some(found) = walk_up(&cwd, paths::GROVE_DIR) {
        return found;
    }
    if let Some(found) = walk_up(&cwd, ".git") {
        return found;
    }

    cwd
}

/// Walk upward from `start` until a directory containing `marker` is found.
fn walk_up(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(marker).is_dir() {
            return Some(dir);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}
