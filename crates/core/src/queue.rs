// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue item types and ordering.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a queued unit of work.
    pub struct ItemId("itm-");
}

/// Execution priority. Declaration order is sort order: high runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

crate::simple_display! {
    Priority {
        High => "high",
        Normal => "normal",
        Low => "low",
    }
}

/// Status of a queue item through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Sort class: pending before running, terminal items last.
    pub fn class(self) -> u8 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Running => 1,
            ItemStatus::Completed | ItemStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

crate::simple_display! {
    ItemStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Caller-supplied options for enqueueing work.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Priority,
    /// Recursion depth of this item (0 for top-level requests).
    pub depth: u8,
    pub parent: Option<ItemId>,
    /// Earliest epoch-ms at which the item may run; None means now.
    pub scheduled_for_ms: Option<u64>,
}

impl EnqueueOptions {
    crate::setters! {
        set {
            priority: Priority,
            depth: u8,
        }
        option {
            parent: ItemId,
            scheduled_for_ms: u64,
        }
    }
}

/// A unit of deferred work: one agent turn to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// Name of the agent to run.
    pub agent: String,
    /// Free-form execution context (message, document path, etc.).
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub priority: Priority,
    /// Recursion depth; children of a spawn are parent depth + 1.
    #[serde(default)]
    pub depth: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,
    pub status: ItemStatus,
    /// Earliest epoch-ms at which the item may run.
    pub scheduled_for_ms: u64,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a pending item from an enqueue request.
    pub fn new(agent: impl Into<String>, context: HashMap<String, String>,
               opts: EnqueueOptions, now_ms: u64) -> Self {
        Self {
            id: ItemId::new(),
            agent: agent.into(),
            context,
            priority: opts.priority,
            depth: opts.depth,
            parent: opts.parent,
            status: ItemStatus::Pending,
            scheduled_for_ms: opts.scheduled_for_ms.unwrap_or(now_ms),
            created_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
            result: None,
            error: None,
        }
    }

    /// Strict ordering key: (status class, priority, scheduled time).
    pub fn sort_key(&self) -> (u8, Priority, u64) {
        (self.status.class(), self.priority, self.scheduled_for_ms)
    }

    /// Whether this pending item is eligible to run at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.status == ItemStatus::Pending && self.scheduled_for_ms <= now_ms
    }
}

crate::builder! {
    pub struct QueueItemBuilder => QueueItem {
        into {
            agent: String = "scribe",
        }
        set {
            id: ItemId = ItemId::new(),
            context: HashMap<String, String> = HashMap::new(),
            priority: Priority = Priority::Normal,
            depth: u8 = 0,
            status: ItemStatus = ItemStatus::Pending,
            scheduled_for_ms: u64 = 0,
            created_at_ms: u64 = 0,
        }
        option {
            parent: ItemId = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            result: String = None,
            error: String = None,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
