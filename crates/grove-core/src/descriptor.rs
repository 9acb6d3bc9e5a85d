//! Per-workspace environment descriptor (`.grove-env.yaml`).
//!
//! The descriptor is the machine-readable contract a workspace exposes to
//! tooling: which port to serve on, where the shared resources live, where
//! the main repository root is. It is regenerated whole on every provision
//! or resume, never merged with a previous version.

use crate::error::Result;
use crate::io;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceEnv {
    #[serde(default = "default_version")]
    pub version: u32,
    pub workspace: String,
    pub branch: String,
    /// Absent when allocation was disabled or exhausted; the workspace is
    /// still usable for everything that does not serve HTTP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Relative to the workspace directory.
    pub shared_root: PathBuf,
    /// Relative to the workspace directory.
    pub repo_root: PathBuf,
    pub created_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl WorkspaceEnv {
    pub fn path(workspace_dir: &Path) -> PathBuf {
        paths::env_path(workspace_dir)
    }

    /// None when no descriptor exists yet: the workspace was never fully
    /// provisioned, or a resume is picking up after a late failure.
    pub fn load(workspace_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(workspace_dir);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let env: WorkspaceEnv = serde_yaml::from_str(&data)?;
        Ok(Some(env))
    }

    pub fn save(&self, workspace_dir: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&Self::path(workspace_dir), data.as_bytes())
    }
}
