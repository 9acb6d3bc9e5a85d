use crate::error::{GroveError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// WorkspaceRequest
// ---------------------------------------------------------------------------

/// What to provision. Name and branch usually coincide but are independent:
/// the name is the directory basename under the workspaces root, the branch
/// is what gets created (or resumed) in git.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceRequest {
    pub name: String,
    pub branch: String,
    pub source_branch: String,
}

impl WorkspaceRequest {
    /// Branch defaults to the workspace name when not given.
    pub fn new(
        name: impl Into<String>,
        branch: Option<String>,
        source_branch: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let branch = branch.unwrap_or_else(|| name.clone());
        Self {
            name,
            branch,
            source_branch: source_branch.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// IncludeChanges
// ---------------------------------------------------------------------------

/// Which local state of the source branch a new workspace carries over.
/// Always explicit — nothing in the core prompts or guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeChanges {
    /// Fork from the source's upstream when it has one, so unpushed
    /// commits stay behind. Carry no working-tree state.
    #[default]
    None,
    /// Fork from the source ref and copy its dirty working tree over.
    Uncommitted,
    /// Fork from the source ref (local commits included); leave the
    /// working tree alone.
    Unpushed,
    /// Local commits plus the dirty working tree.
    All,
}

impl IncludeChanges {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncludeChanges::None => "none",
            IncludeChanges::Uncommitted => "uncommitted",
            IncludeChanges::Unpushed => "unpushed",
            IncludeChanges::All => "all",
        }
    }

    pub fn all_modes() -> &'static [IncludeChanges] {
        &[
            IncludeChanges::None,
            IncludeChanges::Uncommitted,
            IncludeChanges::Unpushed,
            IncludeChanges::All,
        ]
    }

    /// Modes that copy the source's dirty working tree into the new
    /// workspace after the worktree is populated.
    pub fn carries_working_tree(&self) -> bool {
        matches!(self, IncludeChanges::Uncommitted | IncludeChanges::All)
    }
}

impl fmt::Display for IncludeChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncludeChanges {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(IncludeChanges::None),
            "uncommitted" => Ok(IncludeChanges::Uncommitted),
            "unpushed" => Ok(IncludeChanges::Unpushed),
            "all" => Ok(IncludeChanges::All),
            other => Err(GroveError::InvalidChangeMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
