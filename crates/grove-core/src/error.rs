use std::path::PathBuf;
use thiserror::Error;

/// A single link that could not be applied, with the reason it failed.
#[derive(Debug, Clone)]
pub struct LinkFailure {
    pub link: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum GroveError {
    #[error("invalid workspace name '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidName(String),

    #[error("invalid branch name: {0}")]
    InvalidBranch(String),

    #[error("invalid include-changes mode '{0}': expected none, uncommitted, unpushed or all")]
    InvalidChangeMode(String),

    #[error("branch already exists: {branch}{}", directory.as_ref().map(|d| format!(" (target directory {} exists too)", d.display())).unwrap_or_default())]
    BranchExists {
        branch: String,
        directory: Option<PathBuf>,
    },

    #[error("directory already exists: {0}")]
    DirectoryExists(PathBuf),

    #[error("source branch not found: {0} (no local branch, no origin/{0})")]
    SourceNotFound(String),

    #[error("branch '{0}' exists but no workspace directory does; delete the branch or rerun with resume to attach it")]
    DanglingBranchNoDirectory(String),

    #[error("shared resource missing: {0} (run 'grove init' first)")]
    LinkTargetMissing(PathBuf),

    #[error("no free port in {start}-{end} after {attempts} attempts")]
    PortExhausted { start: u16, end: u16, attempts: u32 },

    #[error("{} of {} links failed: {}", failed.len(), applied.len() + failed.len(), failed.iter().map(|f| f.link.as_str()).collect::<Vec<_>>().join(", "))]
    PartialLinkFailure {
        applied: Vec<String>,
        failed: Vec<LinkFailure>,
    },

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("git not found on PATH")]
    GitMissing,

    #[error("git {context} failed: {detail}")]
    Git { context: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl GroveError {
    /// Stable process exit code for each failure class, so callers can
    /// branch on the outcome without parsing messages.
    pub fn exit_code(&self) -> i32 {
        match self {
            GroveError::BranchExists { .. } => 10,
            GroveError::DirectoryExists(_) => 11,
            GroveError::SourceNotFound(_) => 12,
            GroveError::DanglingBranchNoDirectory(_) => 13,
            GroveError::LinkTargetMissing(_) => 14,
            GroveError::PortExhausted { .. } => 15,
            GroveError::PartialLinkFailure { .. } => 16,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, GroveError>;
