//! Shared fixtures for tests that drive a real git repository.

use crate::bootstrap;
use crate::config::Config;
use std::path::Path;
use std::process::Command;

pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}:\nstdout: {}\nstderr: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

/// Initialize a repository on branch `main` with one commit.
pub fn init_repo(dir: &Path) {
    run_git(dir, &["init", "--quiet", "--initial-branch=main"]);
    run_git(dir, &["config", "user.email", "grove-tests@example.com"]);
    run_git(dir, &["config", "user.name", "Grove Tests"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.join("README.md"), "# fixture\n").expect("write README");
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "--quiet", "-m", "initial commit"]);
}

pub fn commit_all(dir: &Path, message: &str) {
    run_git(dir, &["add", "-A"]);
    run_git(dir, &["commit", "--quiet", "-m", message]);
}

/// Repository with shared resources bootstrapped and committed: the state
/// `grove new` expects to run in.
pub fn bootstrapped_repo(dir: &Path) -> Config {
    init_repo(dir);
    let cfg = Config::default();
    bootstrap::bootstrap(dir, &cfg).expect("bootstrap");
    commit_all(dir, "set up shared resources");
    cfg
}
