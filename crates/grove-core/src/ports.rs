//! Port allocation by OS-level bind probing.
//!
//! There is no port registry. The set of ports in use is derived fresh from
//! existing workspace descriptors, and every candidate is additionally
//! probed with a real bind, so allocation stays correct even when
//! descriptors are stale or missing.

use crate::config::Config;
use crate::descriptor::WorkspaceEnv;
use crate::error::{GroveError, Result};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::TcpListener;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct PortAssignment {
    pub workspace: String,
    pub port: u16,
    pub base_url: String,
}

pub fn base_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Ports recorded by existing workspace descriptors, plus the primary
/// port. Unreadable descriptors are skipped: bind probing covers for them.
pub fn used_ports(root: &Path, cfg: &Config) -> Result<BTreeSet<u16>> {
    let mut used = BTreeSet::new();
    used.insert(cfg.ports.primary);

    let ws_root = cfg.workspaces_root(root);
    let entries = match std::fs::read_dir(&ws_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(used),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Ok(Some(env)) = WorkspaceEnv::load(&entry.path()) {
            if let Some(port) = env.port {
                used.insert(port);
            }
        }
    }
    Ok(used)
}

/// Allocate a port for `workspace`.
///
/// The primary workspace always gets the fixed configured port, no
/// probing. Everyone else gets a uniformly sampled candidate from the
/// configured range that is neither in `used` nor currently bindable-free
/// on loopback, with the number of draws bounded by `max_attempts`.
///
/// The probe socket is released immediately; the window between release
/// and the workspace server binding it is accepted.
pub fn allocate(cfg: &Config, workspace: &str, used: &BTreeSet<u16>) -> Result<PortAssignment> {
    if cfg.is_primary(workspace) {
        return Ok(PortAssignment {
            workspace: workspace.to_string(),
            port: cfg.ports.primary,
            base_url: base_url(cfg.ports.primary),
        });
    }

    let start = cfg.ports.range_start;
    let end = cfg.ports.range_end;
    if start > end {
        return Err(GroveError::PortExhausted {
            start,
            end,
            attempts: 0,
        });
    }

    let mut rng = rand::thread_rng();
    for _ in 0..cfg.ports.max_attempts {
        let candidate = rng.gen_range(start..=end);
        if used.contains(&candidate) {
            continue;
        }
        if probe(candidate) {
            return Ok(PortAssignment {
                workspace: workspace.to_string(),
                port: candidate,
                base_url: base_url(candidate),
            });
        }
    }
    Err(GroveError::PortExhausted {
        start,
        end,
        attempts: cfg.ports.max_attempts,
    })
}

fn probe(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
