// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue: strict ordering, backpressure, crash-safe persistence.
//!
//! The in-memory list is the single source of truth while running; the
//! full list is written through to the snapshot after every mutation,
//! and a failed write leaves the list as it was so memory and snapshot
//! never diverge. Status transitions happen only through the `mark_*`
//! methods, under the queue mutex.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use warden_core::{Clock, EnqueueOptions, ItemId, ItemStatus, QueueItem};
use warden_storage::{QueueStore, StorageError};

/// Errors from queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue full: {0} pending items")]
    Full(usize),
    #[error("depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: u8, max: u8 },
    #[error("unknown queue item: {0}")]
    UnknownItem(ItemId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Point-in-time queue snapshot for callers.
#[derive(Debug, Clone)]
pub struct QueueState {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<QueueItem>,
}

/// Priority/scheduled-time ordered queue with bounded pending items.
pub struct WorkQueue<C: Clock> {
    store: QueueStore,
    clock: C,
    capacity: usize,
    retention: usize,
    max_depth: u8,
    items: Mutex<Vec<QueueItem>>,
}

impl<C: Clock> WorkQueue<C> {
    pub fn new(store: QueueStore, clock: C, capacity: usize, retention: usize, max_depth: u8) -> Self {
        Self { store, clock, capacity, retention, max_depth, items: Mutex::new(Vec::new()) }
    }

    /// Restore from the snapshot; interrupted `running` items come back
    /// `pending` (reset in the store on load).
    pub fn restore(&self) -> Result<usize, QueueError> {
        let mut loaded = self.store.load()?;
        loaded.sort_by_key(QueueItem::sort_key);
        let count = loaded.len();
        *self.items.lock() = loaded;
        Ok(count)
    }

    /// Add a unit of work in sorted position.
    ///
    /// Rejected synchronously when depth is at or past the maximum or
    /// the pending count has hit the cap; rejected work is never queued.
    pub fn enqueue(
        &self,
        agent: impl Into<String>,
        context: HashMap<String, String>,
        opts: EnqueueOptions,
    ) -> Result<ItemId, QueueError> {
        if opts.depth >= self.max_depth {
            return Err(QueueError::DepthExceeded { depth: opts.depth, max: self.max_depth });
        }
        let mut items = self.items.lock();
        let pending = items.iter().filter(|i| i.status == ItemStatus::Pending).count();
        if pending >= self.capacity {
            return Err(QueueError::Full(pending));
        }
        let item = QueueItem::new(agent, context, opts, self.clock.epoch_ms());
        let id = item.id.clone();
        let at = items.partition_point(|existing| existing.sort_key() <= item.sort_key());
        items.insert(at, item);
        if let Err(e) = self.persist(&items) {
            // Memory and snapshot must not diverge: undo the insert.
            items.remove(at);
            return Err(e);
        }
        tracing::debug!(item_id = %id, "enqueued work item");
        Ok(id)
    }

    /// First pending item whose scheduled time has elapsed, if any.
    pub fn get_next(&self) -> Option<QueueItem> {
        let now = self.clock.epoch_ms();
        self.items.lock().iter().find(|item| item.is_due(now)).cloned()
    }

    /// Atomically take the next due item and mark it running.
    pub fn claim_next(&self) -> Result<Option<QueueItem>, QueueError> {
        let now = self.clock.epoch_ms();
        let mut items = self.items.lock();
        let Some(pos) = items.iter().position(|item| item.is_due(now)) else {
            return Ok(None);
        };
        // Stage the claim; commit to memory only once the snapshot holds it.
        let mut staged = items.clone();
        staged[pos].status = ItemStatus::Running;
        staged[pos].started_at_ms = Some(now);
        let claimed = staged[pos].clone();
        Self::resort(&mut staged);
        self.persist(&staged)?;
        *items = staged;
        Ok(Some(claimed))
    }

    pub fn mark_running(&self, id: &ItemId) -> Result<(), QueueError> {
        self.transition(id, |item, now| {
            item.status = ItemStatus::Running;
            item.started_at_ms = Some(now);
        })
    }

    pub fn mark_completed(&self, id: &ItemId, result: impl Into<String>) -> Result<(), QueueError> {
        let result = result.into();
        self.transition(id, move |item, now| {
            item.status = ItemStatus::Completed;
            item.completed_at_ms = Some(now);
            item.result = Some(result);
        })
    }

    pub fn mark_failed(&self, id: &ItemId, error: impl Into<String>) -> Result<(), QueueError> {
        let error = error.into();
        self.transition(id, move |item, now| {
            item.status = ItemStatus::Failed;
            item.completed_at_ms = Some(now);
            item.error = Some(error);
        })
    }

    /// Snapshot of counts and items for status queries.
    pub fn queue_state(&self) -> QueueState {
        let items = self.items.lock();
        let count = |status: ItemStatus| items.iter().filter(|i| i.status == status).count();
        QueueState {
            pending: count(ItemStatus::Pending),
            running: count(ItemStatus::Running),
            completed: count(ItemStatus::Completed),
            failed: count(ItemStatus::Failed),
            items: items.clone(),
        }
    }

    fn transition(
        &self,
        id: &ItemId,
        apply: impl FnOnce(&mut QueueItem, u64),
    ) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        let mut items = self.items.lock();
        let mut staged = items.clone();
        let Some(item) = staged.iter_mut().find(|item| item.id == *id) else {
            return Err(QueueError::UnknownItem(id.clone()));
        };
        apply(item, now);
        Self::resort(&mut staged);
        Self::prune(&mut staged, self.retention);
        self.persist(&staged)?;
        *items = staged;
        Ok(())
    }

    /// Keep only the most recent `retention` terminal items.
    fn prune(items: &mut Vec<QueueItem>, retention: usize) {
        let terminal = items.iter().filter(|i| i.status.is_terminal()).count();
        if terminal <= retention {
            return;
        }
        let mut done: Vec<(u64, ItemId)> = items
            .iter()
            .filter(|i| i.status.is_terminal())
            .map(|i| (i.completed_at_ms.unwrap_or(i.created_at_ms), i.id.clone()))
            .collect();
        done.sort();
        let drop_count = terminal - retention;
        let doomed: Vec<ItemId> = done.into_iter().take(drop_count).map(|(_, id)| id).collect();
        items.retain(|item| !doomed.contains(&item.id));
    }

    fn resort(items: &mut [QueueItem]) {
        items.sort_by_key(QueueItem::sort_key);
    }

    fn persist(&self, items: &[QueueItem]) -> Result<(), QueueError> {
        self.store.save(items)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
