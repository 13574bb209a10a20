// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission tiers and in-flight approval tickets.
//!
//! Every tool use requested by the backend is classified into one of
//! three tiers: read-only (always allowed), policy-gated writes
//! (allow-list or explicit approval), and capability-gated tool sets.
//! The classification is fixed — it is a safety property, not a
//! configuration surface.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a pending permission request.
    pub struct PermissionId("prm-");
}

/// The three-level permission classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Read-only or informational operations. No gate.
    ReadOnly,
    /// Mutations: file writes, command execution. Allow-list or approval.
    Write,
    /// Named external capability sets. Built-ins auto-approved.
    Capability,
}

crate::simple_display! {
    Tier {
        ReadOnly => "read_only",
        Write => "write",
        Capability => "capability",
    }
}

/// Read-only tools the backend may always use.
const READ_ONLY_TOOLS: &[&str] = &["read", "glob", "grep", "list", "web_fetch", "web_search"];

/// Mutation tools gated by the agent's allow-list.
const WRITE_TOOLS: &[&str] = &["write", "edit", "bash"];

/// Trusted capability sets that never require approval.
const BUILTIN_CAPABILITIES: &[&str] = &["files", "search", "web"];

/// Fixed classification of a requested tool into its tier.
///
/// Unknown names are capability-gated: an unrecognized tool is by
/// definition an external capability, never a silent write.
pub fn classify(tool: &str) -> Tier {
    if READ_ONLY_TOOLS.contains(&tool) {
        Tier::ReadOnly
    } else if WRITE_TOOLS.contains(&tool) {
        Tier::Write
    } else {
        Tier::Capability
    }
}

/// Whether a capability set is built-in and trusted.
pub fn is_builtin_capability(name: &str) -> bool {
    BUILTIN_CAPABILITIES.contains(&name)
}

/// Why a gated operation was disallowed. Timeouts and cancellations are
/// kept distinct from explicit denial for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// An approver explicitly denied the request.
    Denied,
    /// No approver responded within the timeout.
    TimedOut,
    /// The owning turn was aborted while the request was pending.
    Cancelled,
}

crate::simple_display! {
    DenyReason {
        Denied => "denied",
        TimedOut => "denied: timeout",
        Cancelled => "denied: cancelled",
    }
}

/// Allow/deny decision returned by a permission gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Resolution state of a permission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Pending,
    Granted,
    Denied(DenyReason),
}

/// An in-flight approval ticket for a sensitive operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: PermissionId,
    /// Requested tool or capability name.
    pub tool: String,
    /// Target of the operation: file path, command line, or set name.
    pub target: String,
    /// Agent on whose behalf the operation was requested.
    pub agent: String,
    pub created_at_ms: u64,
    pub status: PermissionStatus,
}

impl PermissionRequest {
    pub fn new(
        tool: impl Into<String>,
        target: impl Into<String>,
        agent: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id: PermissionId::new(),
            tool: tool.into(),
            target: target.into(),
            agent: agent.into(),
            created_at_ms: now_ms,
            status: PermissionStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PermissionStatus::Pending
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
