//! Thin wrapper around the `git` CLI.
//!
//! All version-control work goes through a spawned `git` subprocess with
//! captured output; nothing links against libgit2. Failures carry the most
//! useful stderr line in [`GroveError::Git`] so callers can surface git's
//! own diagnosis without re-parsing it.

use crate::error::{GroveError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Fail early with a clear message when git is not installed at all.
pub fn ensure_git() -> Result<()> {
    which::which("git").map_err(|_| GroveError::GitMissing)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subprocess plumbing
// ---------------------------------------------------------------------------

pub(crate) struct CmdOutput {
    pub(crate) status: std::process::ExitStatus,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl CmdOutput {
    pub(crate) fn ok(&self) -> bool {
        self.status.success()
    }
}

fn map_spawn_error(err: std::io::Error) -> GroveError {
    match err.kind() {
        std::io::ErrorKind::NotFound => GroveError::GitMissing,
        _ => GroveError::Io(err),
    }
}

pub(crate) fn run(dir: &Path, args: &[&str]) -> Result<CmdOutput> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(map_spawn_error)?;
    Ok(CmdOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run git and require success; returns trimmed stdout.
pub(crate) fn run_checked(dir: &Path, args: &[&str], context: &str) -> Result<String> {
    let out = run(dir, args)?;
    if !out.ok() {
        return Err(GroveError::Git {
            context: context.to_string(),
            detail: best_error_line(&out),
        });
    }
    Ok(out.stdout.trim().to_string())
}

fn run_with_input(dir: &Path, args: &[&str], input: &[u8], context: &str) -> Result<()> {
    use std::io::Write;

    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(map_spawn_error)?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(input)?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let out = CmdOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        return Err(GroveError::Git {
            context: context.to_string(),
            detail: best_error_line(&out),
        });
    }
    Ok(())
}

/// Pick the line most worth showing: the first stderr line starting with
/// "error:", else the last non-empty stderr line, else stdout, else the
/// exit status.
pub(crate) fn best_error_line(out: &CmdOutput) -> String {
    let lines: Vec<&str> = out
        .stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if let Some(line) = lines
        .iter()
        .find(|l| l.to_ascii_lowercase().starts_with("error:"))
    {
        return (*line).to_string();
    }
    if let Some(line) = lines.last() {
        return (*line).to_string();
    }
    if let Some(line) = out.stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
        return line.to_string();
    }
    format!("exit status {}", out.status)
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| GroveError::Git {
        context: "path".to_string(),
        detail: format!("not valid UTF-8: {}", path.display()),
    })
}

// ---------------------------------------------------------------------------
// Refs and branches
// ---------------------------------------------------------------------------

pub fn branch_exists(root: &Path, branch: &str) -> Result<bool> {
    let refname = format!("refs/heads/{branch}");
    Ok(run(root, &["show-ref", "--verify", "--quiet", &refname])?.ok())
}

pub fn remote_branch_exists(root: &Path, remote: &str, branch: &str) -> Result<bool> {
    let refname = format!("refs/remotes/{remote}/{branch}");
    Ok(run(root, &["show-ref", "--verify", "--quiet", &refname])?.ok())
}

pub fn branch_name_ok(root: &Path, branch: &str) -> Result<bool> {
    Ok(run(root, &["check-ref-format", "--branch", branch])?.ok())
}

pub fn rev_exists(root: &Path, revision: &str) -> Result<bool> {
    let revspec = format!("{revision}^{{commit}}");
    Ok(run(root, &["rev-parse", "--verify", "--quiet", &revspec])?.ok())
}

/// Branch checked out in `dir`, or None when detached.
pub fn current_branch(dir: &Path) -> Result<Option<String>> {
    let out = run(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if !out.ok() {
        return Ok(None);
    }
    let branch = out.stdout.trim();
    if branch.is_empty() || branch == "HEAD" {
        return Ok(None);
    }
    Ok(Some(branch.to_string()))
}

/// The upstream ref of `branch` (e.g. "origin/main"), or None when no
/// upstream is configured.
pub fn upstream_of(root: &Path, branch: &str) -> Result<Option<String>> {
    let revspec = format!("{branch}@{{upstream}}");
    let out = run(root, &["rev-parse", "--abbrev-ref", &revspec])?;
    if !out.ok() {
        return Ok(None);
    }
    let upstream = out.stdout.trim();
    if upstream.is_empty() {
        return Ok(None);
    }
    Ok(Some(upstream.to_string()))
}

/// Number of commits reachable from `branch` but not from its upstream.
/// Zero when no upstream is configured.
pub fn unpushed_count(root: &Path, branch: &str) -> Result<u32> {
    let upstream = match upstream_of(root, branch)? {
        Some(u) => u,
        None => return Ok(0),
    };
    let range = format!("{upstream}..{branch}");
    let stdout = run_checked(root, &["rev-list", "--count", &range], "rev-list")?;
    stdout.parse::<u32>().map_err(|_| GroveError::Git {
        context: "rev-list".to_string(),
        detail: format!("unexpected count output: {stdout}"),
    })
}

pub fn branch_delete(root: &Path, branch: &str) -> Result<()> {
    run_checked(root, &["branch", "-D", branch], "branch delete")?;
    Ok(())
}

pub fn fetch(root: &Path, remote: &str) -> Result<()> {
    run_checked(root, &["fetch", "--quiet", remote], "fetch")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Worktrees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: Option<String>,
}

pub fn list_worktrees(root: &Path) -> Result<Vec<WorktreeInfo>> {
    let stdout = run_checked(root, &["worktree", "list", "--porcelain"], "worktree list")?;
    Ok(parse_worktree_porcelain(&stdout))
}

pub(crate) fn parse_worktree_porcelain(raw: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch: Option<String> = None;

    let flush = |entries: &mut Vec<WorktreeInfo>,
                 path: &mut Option<PathBuf>,
                 branch: &mut Option<String>| {
        if let Some(p) = path.take() {
            entries.push(WorktreeInfo {
                path: p,
                branch: branch.take(),
            });
        } else {
            branch.take();
        }
    };

    for line in raw.lines() {
        if line.is_empty() {
            flush(&mut entries, &mut path, &mut branch);
            continue;
        }
        if let Some(value) = line.strip_prefix("worktree ") {
            flush(&mut entries, &mut path, &mut branch);
            path = Some(PathBuf::from(value.trim()));
            continue;
        }
        if let Some(value) = line.strip_prefix("branch ") {
            if let Some(short) = value.trim().strip_prefix("refs/heads/") {
                branch = Some(short.to_string());
            }
        }
    }
    flush(&mut entries, &mut path, &mut branch);
    entries
}

/// Where `branch` is currently checked out, if anywhere.
pub fn find_worktree_for_branch(root: &Path, branch: &str) -> Result<Option<PathBuf>> {
    Ok(list_worktrees(root)?
        .into_iter()
        .find(|w| w.branch.as_deref() == Some(branch))
        .map(|w| w.path))
}

/// `git worktree add <dir> -b <branch> <start>` — creates the branch,
/// registers the worktree, and populates the directory in one command.
pub fn worktree_add_new_branch(root: &Path, dir: &Path, branch: &str, start: &str) -> Result<()> {
    let dir_arg = path_arg(dir)?;
    run_checked(
        root,
        &["worktree", "add", dir_arg, "-b", branch, start],
        "worktree add",
    )?;
    Ok(())
}

/// `git worktree add <dir> <branch>` for a branch that already exists.
pub fn worktree_add_existing(root: &Path, dir: &Path, branch: &str) -> Result<()> {
    let dir_arg = path_arg(dir)?;
    run_checked(root, &["worktree", "add", dir_arg, branch], "worktree add")?;
    Ok(())
}

/// Returns false when git refused (e.g. the directory was already deleted
/// by hand); callers fall back to prune + manual removal.
pub fn worktree_remove(root: &Path, dir: &Path) -> Result<bool> {
    let dir_arg = path_arg(dir)?;
    Ok(run(root, &["worktree", "remove", "--force", dir_arg])?.ok())
}

pub fn worktree_prune(root: &Path) -> Result<()> {
    run_checked(root, &["worktree", "prune"], "worktree prune")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Working-tree state
// ---------------------------------------------------------------------------

pub fn has_uncommitted(dir: &Path) -> Result<bool> {
    let stdout = run_checked(dir, &["status", "--porcelain"], "status")?;
    Ok(!stdout.is_empty())
}

/// Untracked, non-ignored files in `dir`, as repo-relative paths.
pub fn untracked_files(dir: &Path) -> Result<Vec<String>> {
    let out = run(dir, &["ls-files", "--others", "--exclude-standard", "-z"])?;
    if !out.ok() {
        return Err(GroveError::Git {
            context: "ls-files".to_string(),
            detail: best_error_line(&out),
        });
    }
    Ok(out
        .stdout
        .split('\0')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Tracked modifications in `dir` as a binary-safe patch against HEAD.
pub fn diff_binary_head(dir: &Path) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(["diff", "--binary", "HEAD"])
        .current_dir(dir)
        .output()
        .map_err(map_spawn_error)?;
    if !output.status.success() {
        let out = CmdOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        return Err(GroveError::Git {
            context: "diff".to_string(),
            detail: best_error_line(&out),
        });
    }
    Ok(output.stdout)
}

/// Apply a patch produced by [`diff_binary_head`] in another worktree.
/// Three-way mode works because both worktrees share one object store.
pub fn apply_patch(dir: &Path, patch: &[u8]) -> Result<()> {
    run_with_input(
        dir,
        &["apply", "--3way", "--whitespace=nowarn"],
        patch,
        "apply",
    )
}

// ---------------------------------------------------------------------------
// Repository discovery
// ---------------------------------------------------------------------------

/// The main repository root from anywhere inside it, including from inside
/// a linked worktree (where `--show-toplevel` would return the worktree).
pub fn common_root(start: &Path) -> Option<PathBuf> {
    let out = run(
        start,
        &["rev-parse", "--path-format=absolute", "--git-common-dir"],
    )
    .ok()?;
    if !out.ok() {
        return None;
    }
    let common_dir = PathBuf::from(out.stdout.trim());
    if common_dir.file_name()? != ".git" {
        return None;
    }
    common_dir.parent().map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
