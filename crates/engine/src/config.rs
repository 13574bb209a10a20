// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration with serde defaults, loadable from `warden.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine tunables. Every field has a default so a missing or partial
/// config file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Root of the durable state directory.
    pub state_dir: PathBuf,
    /// Directory of agent definition TOML files.
    pub agents_dir: PathBuf,
    /// Maximum spawn recursion depth; items at this depth are rejected.
    pub max_depth: u8,
    /// Pending-item cap for enqueue backpressure.
    pub queue_capacity: usize,
    /// Terminal queue items retained before pruning, oldest first.
    pub retention: usize,
    /// How long a blocked permission request waits before denying.
    pub permission_timeout_secs: u64,
    /// Cap on simultaneously pending permission requests.
    pub max_pending_permissions: usize,
    /// Per-session write-lock acquisition timeout.
    pub lock_timeout_secs: u64,
    /// Session index entries retained (LRU by last access).
    pub index_max: usize,
    /// Hot-cache entries older than this are swept.
    pub cache_max_age_secs: u64,
    /// Trigger scan period.
    pub scan_interval_secs: u64,
    /// Concurrent queue workers.
    pub worker_concurrency: usize,
    /// Worker queue-poll period.
    pub worker_poll_ms: u64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".warden"),
            agents_dir: PathBuf::from("agents"),
            max_depth: 3,
            queue_capacity: 100,
            retention: 50,
            permission_timeout_secs: 120,
            max_pending_permissions: 64,
            lock_timeout_secs: 30,
            index_max: 1000,
            cache_max_age_secs: 30 * 60,
            scan_interval_secs: 60,
            worker_concurrency: 1,
            worker_poll_ms: 500,
        }
    }
}

impl WardenConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_secs(self.permission_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn cache_max_age_ms(&self) -> u64 {
        self.cache_max_age_secs * 1000
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
