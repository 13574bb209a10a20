// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable mirror of finalized sessions.
//!
//! One JSON record per session at `sessions/<agent>/<token>.json`. Only
//! finalized sessions are written — an unfinalized session has no token
//! to key the record by, so it lives purely in memory until its first
//! turn completes.

use crate::{read_json, sanitize_component, write_atomic, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use warden_core::{Session, SessionMeta, SessionToken};

/// Record-per-session store rooted at `<root>/sessions/`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// Deterministic record path for a finalized session.
    pub fn record_path(&self, agent: &str, token: &SessionToken) -> PathBuf {
        self.sessions_dir()
            .join(sanitize_component(agent))
            .join(format!("{}.json", sanitize_component(token.as_str())))
    }

    /// Persist a finalized session, replacing any prior record.
    ///
    /// Returns the record path for indexing. Rejects unfinalized
    /// sessions rather than inventing a key for them.
    pub fn save(&self, session: &Session) -> Result<PathBuf, StorageError> {
        let token = session.token.as_ref().ok_or(StorageError::UnfinalizedSession)?;
        let path = self.record_path(&session.agent, token);
        write_atomic(&path, session)?;
        Ok(path)
    }

    /// Load a session record by its known path.
    pub fn load_path(&self, path: &Path) -> Result<Session, StorageError> {
        read_json(path)
    }

    /// Load a session record by agent and token.
    pub fn load(&self, agent: &str, token: &SessionToken) -> Result<Session, StorageError> {
        self.load_path(&self.record_path(agent, token))
    }

    /// Remove a session record. Missing records are an error — deletion
    /// of something that does not exist signals a stale index.
    pub fn delete(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.display().to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    /// Walk every record on disk and rebuild index entries.
    ///
    /// Unreadable or corrupt records are logged and skipped; one bad
    /// file must not take the whole index down.
    pub fn scan(&self) -> Result<Vec<SessionMeta>, StorageError> {
        let dir = self.sessions_dir();
        let mut metas = Vec::new();
        let agents = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(metas),
            Err(e) => return Err(e.into()),
        };

        for agent_dir in agents {
            let agent_dir = agent_dir?;
            if !agent_dir.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(agent_dir.path())? {
                let path = entry?.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                match read_json::<Session>(&path) {
                    Ok(session) => {
                        if let Some(meta) = SessionMeta::from_session(&session, path.clone()) {
                            metas.push(meta);
                        } else {
                            tracing::warn!(path = %path.display(), "record without token, skipping");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable session record, skipping");
                    }
                }
            }
        }
        Ok(metas)
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
