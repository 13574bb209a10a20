// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable records of agent-document attachments.
//!
//! One JSON record per document at `documents/<slug>.json`. The slug
//! combines the sanitized file name with a hash of the full path so two
//! documents named `notes.md` in different directories never collide.

use crate::{read_json, sanitize_component, write_atomic, StorageError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use warden_core::DocumentAgents;

/// Record-per-document store rooted at `<root>/documents/`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    /// Stable slug for a document path: `<file-name>-<hash8>`.
    pub fn slug(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| sanitize_component(&n.to_string_lossy()))
            .unwrap_or_else(|| "_".to_string());
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let hash8: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
        format!("{name}-{hash8}")
    }

    fn record_path(&self, path: &Path) -> PathBuf {
        self.documents_dir().join(format!("{}.json", Self::slug(path)))
    }

    /// Persist the full attachment record for a document.
    pub fn save(&self, doc: &DocumentAgents) -> Result<(), StorageError> {
        write_atomic(&self.record_path(&doc.path), doc)
    }

    /// Load a document record, or None if the document has no agents.
    pub fn load(&self, path: &Path) -> Result<Option<DocumentAgents>, StorageError> {
        match read_json(&self.record_path(path)) {
            Ok(doc) => Ok(Some(doc)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove a document record. Removing a record that never existed is
    /// a no-op.
    pub fn delete(&self, path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(self.record_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Walk every document record on disk.
    ///
    /// Unreadable records are logged and skipped so one corrupt file
    /// cannot block the trigger scanner.
    pub fn scan(&self) -> Result<Vec<DocumentAgents>, StorageError> {
        let dir = self.documents_dir();
        let mut docs = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(docs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_json::<DocumentAgents>(&path) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable document record, skipping");
                }
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
#[path = "documents_tests.rs"]
mod tests;
