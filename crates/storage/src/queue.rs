// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-list queue snapshot.
//!
//! The whole queue is rewritten to `queue.json` after every mutation,
//! with the previous snapshot rotated to `.bak` first. On load, items
//! left `running` by a crash are reset to `pending` so interrupted work
//! re-runs instead of wedging forever.

use crate::{read_json, rotate_bak_path, write_atomic, StorageError};
use std::fs;
use std::path::PathBuf;
use warden_core::{ItemStatus, QueueItem};

/// Snapshot store for the work queue, rooted at `<root>/queue.json`.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { path: root.into().join("queue.json") }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Replace the on-disk snapshot with the full current item list.
    ///
    /// The previous snapshot is kept as a rotating backup before the
    /// atomic replace.
    pub fn save(&self, items: &[QueueItem]) -> Result<(), StorageError> {
        if self.path.exists() {
            let bak = rotate_bak_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &bak) {
                tracing::warn!(path = %bak.display(), error = %e, "failed to rotate queue backup");
            }
        }
        write_atomic(&self.path, &items)
    }

    /// Load the snapshot, resetting crashed `running` items to `pending`.
    ///
    /// A missing snapshot is an empty queue, not an error.
    pub fn load(&self) -> Result<Vec<QueueItem>, StorageError> {
        let mut items: Vec<QueueItem> = match read_json(&self.path) {
            Ok(items) => items,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        for item in &mut items {
            if item.status == ItemStatus::Running {
                tracing::info!(item_id = %item.id, agent = %item.agent,
                    "resetting interrupted item to pending");
                item.status = ItemStatus::Pending;
                item.started_at_ms = None;
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
