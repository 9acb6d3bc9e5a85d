use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PortsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsConfig {
    /// When false, provisioning skips port allocation entirely.
    #[serde(default = "default_ports_enabled")]
    pub enabled: bool,
    /// Fixed port for the primary workspace; never probed.
    #[serde(default = "default_primary_port")]
    pub primary: u16,
    #[serde(default = "default_range_start")]
    pub range_start: u16,
    #[serde(default = "default_range_end")]
    pub range_end: u16,
    /// Bound on probe rounds before giving up with an exhaustion error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_ports_enabled() -> bool {
    true
}

fn default_primary_port() -> u16 {
    3000
}

fn default_range_start() -> u16 {
    3001
}

fn default_range_end() -> u16 {
    3999
}

fn default_max_attempts() -> u32 {
    50
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            enabled: default_ports_enabled(),
            primary: default_primary_port(),
            range_start: default_range_start(),
            range_end: default_range_end(),
            max_attempts: default_max_attempts(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Directory under the repository root that holds one worktree per
    /// workspace.
    #[serde(default = "default_workspaces_dir")]
    pub workspaces_dir: String,
    /// Directory that holds the resources shared across all workspaces.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: String,
    /// The long-lived branch checked out at the repository root. Default
    /// source for new workspaces, and the workspace that gets the fixed port.
    #[serde(default = "default_primary_branch")]
    pub primary_branch: String,
    #[serde(default)]
    pub ports: PortsConfig,
}

fn default_version() -> u32 {
    1
}

fn default_workspaces_dir() -> String {
    paths::DEFAULT_WORKSPACES_DIR.to_string()
}

fn default_shared_dir() -> String {
    paths::DEFAULT_SHARED_DIR.to_string()
}

fn default_primary_branch() -> String {
    paths::DEFAULT_PRIMARY_BRANCH.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspaces_dir: default_workspaces_dir(),
            shared_dir: default_shared_dir(),
            primary_branch: default_primary_branch(),
            ports: PortsConfig::default(),
        }
    }
}

impl Config {
    /// Load `.grove/config.yaml`, or fall back to defaults when it does not
    /// exist yet. Provisioning in an un-bootstrapped repository should fail
    /// on the missing shared root, not on a missing config file.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Derived paths
    // -----------------------------------------------------------------------

    pub fn workspaces_root(&self, root: &Path) -> PathBuf {
        root.join(&self.workspaces_dir)
    }

    pub fn shared_root(&self, root: &Path) -> PathBuf {
        root.join(&self.shared_dir)
    }

    pub fn workspace_dir(&self, root: &Path, name: &str) -> PathBuf {
        self.workspaces_root(root).join(name)
    }

    /// The primary workspace is the repository root checkout itself.
    pub fn is_primary(&self, workspace: &str) -> bool {
        workspace == self.primary_branch
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.ports.range_start > self.ports.range_end {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "ports.range_start {} is above ports.range_end {}",
                    self.ports.range_start, self.ports.range_end
                ),
            });
        }

        if (self.ports.range_start..=self.ports.range_end).contains(&self.ports.primary) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "ports.primary {} falls inside the probe range {}-{}",
                    self.ports.primary, self.ports.range_start, self.ports.range_end
                ),
            });
        }

        if self.ports.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "ports.max_attempts must be at least 1".to_string(),
            });
        }

        for (field, value) in [
            ("workspaces_dir", &self.workspaces_dir),
            ("shared_dir", &self.shared_dir),
        ] {
            if value.is_empty() || value.contains('/') || value.contains('\\') {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{field} must be a single directory name, got '{value}'"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.workspaces_dir, "workspaces");
        assert_eq!(cfg.shared_dir, ".shared");
        assert_eq!(cfg.primary_branch, "main");
        assert_eq!(cfg.ports.primary, 3000);
        assert_eq!(cfg.ports.range_start, 3001);
        assert_eq!(cfg.ports.range_end, 3999);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.primary_branch, "main");
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.primary_branch = "trunk".to_string();
        cfg.ports.primary = 4000;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.primary_branch, "trunk");
        assert_eq!(loaded.ports.primary, 4000);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".grove/config.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "primary_branch: develop\n").unwrap();

        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.primary_branch, "develop");
        assert_eq!(cfg.workspaces_dir, "workspaces");
        assert_eq!(cfg.ports.max_attempts, 50);
    }

    #[test]
    fn partial_ports_section_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".grove/config.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "ports:\n  range_start: 8000\n").unwrap();

        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.ports.range_start, 8000);
        assert_eq!(cfg.ports.range_end, 3999);
        assert!(cfg.ports.enabled);
    }

    #[test]
    fn validate_flags_inverted_range() {
        let mut cfg = Config::default();
        cfg.ports.range_start = 4000;
        cfg.ports.range_end = 3001;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn validate_flags_primary_inside_range() {
        let mut cfg = Config::default();
        cfg.ports.primary = 3500;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("inside the probe range")));
    }

    #[test]
    fn validate_flags_nested_dir_names() {
        let mut cfg = Config::default();
        cfg.shared_dir = "nested/shared".to_string();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn workspace_dir_layout() {
        let cfg = Config::default();
        let root = Path::new("/repo");
        assert_eq!(
            cfg.workspace_dir(root, "issue-42"),
            PathBuf::from("/repo/workspaces/issue-42")
        );
        assert_eq!(cfg.shared_root(root), PathBuf::from("/repo/.shared"));
    }

    #[test]
    fn primary_is_name_based() {
        let cfg = Config::default();
        assert!(cfg.is_primary("main"));
        assert!(!cfg.is_primary("issue-42"));
    }
}
