// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-turn permission seam between backend and engine.

use async_trait::async_trait;
use warden_core::GateDecision;

/// Screens tool invocations before the backend executes them.
///
/// One gate instance is built per turn, so implementations carry the
/// session context (tier caches, allow-lists) internally. `check` may
/// block for a long time — an interactive approval can take up to the
/// engine's permission timeout.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(&self, tool: &str, input: &serde_json::Value) -> GateDecision;
}
