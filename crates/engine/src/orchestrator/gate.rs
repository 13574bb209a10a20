// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission broker and the per-turn gate built on top of it.
//!
//! Gated operations become request/response exchanges: the gate files
//! a ticket and awaits a oneshot decision, bounded by the approval
//! timeout and the turn's cancellation token. The pending registry is
//! instance-owned and capped; a full registry denies rather than grows.

use glob::Pattern;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use warden_core::{
    classify, is_builtin_capability, AgentDef, Clock, DenyReason, GateDecision, PermissionId,
    PermissionRequest, SessionToken, Tier,
};

struct PendingEntry {
    request: PermissionRequest,
    turn: u64,
    responder: oneshot::Sender<GateDecision>,
}

#[derive(Default)]
struct BrokerInner {
    pending: HashMap<PermissionId, PendingEntry>,
    /// Capability names approved for the rest of a session.
    session_grants: HashMap<SessionToken, HashSet<String>>,
}

/// Instance-owned registry of in-flight permission requests.
pub struct PermissionBroker<C: Clock> {
    clock: C,
    timeout: Duration,
    max_pending: usize,
    turn_counter: AtomicU64,
    inner: Mutex<BrokerInner>,
}

impl<C: Clock> PermissionBroker<C> {
    pub fn new(clock: C, timeout: Duration, max_pending: usize) -> Self {
        Self {
            clock,
            timeout,
            max_pending,
            turn_counter: AtomicU64::new(1),
            inner: Mutex::new(BrokerInner::default()),
        }
    }

    /// Tag for one turn's requests, so an abort can resolve exactly
    /// that turn's tickets.
    pub fn begin_turn(&self) -> u64 {
        self.turn_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// File a ticket and block until an approver resolves it, the
    /// timeout elapses, or the owning turn is aborted.
    pub async fn wait(
        &self,
        request: PermissionRequest,
        turn: u64,
        cancel: &CancellationToken,
    ) -> GateDecision {
        let id = request.id.clone();
        let (responder, decision_rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            if inner.pending.len() >= self.max_pending {
                tracing::warn!(tool = %request.tool, agent = %request.agent,
                    max = self.max_pending, "permission registry full, denying");
                return GateDecision::Deny(DenyReason::Denied);
            }
            tracing::info!(id = %id, tool = %request.tool, target = %request.target,
                agent = %request.agent, "permission approval requested");
            inner.pending.insert(id.clone(), PendingEntry { request, turn, responder });
        }

        tokio::select! {
            decision = decision_rx => {
                decision.unwrap_or(GateDecision::Deny(DenyReason::Cancelled))
            }
            _ = tokio::time::sleep(self.timeout) => {
                self.inner.lock().pending.remove(&id);
                tracing::warn!(id = %id, timeout = ?self.timeout, "permission request timed out");
                GateDecision::Deny(DenyReason::TimedOut)
            }
            _ = cancel.cancelled() => {
                self.inner.lock().pending.remove(&id);
                GateDecision::Deny(DenyReason::Cancelled)
            }
        }
    }

    /// Resolve a ticket; false if it is no longer pending.
    pub fn resolve(&self, id: &PermissionId, decision: GateDecision) -> bool {
        let entry = self.inner.lock().pending.remove(id);
        match entry {
            Some(entry) => {
                tracing::info!(id = %id, decision = ?decision, "permission request resolved");
                entry.responder.send(decision).is_ok()
            }
            None => false,
        }
    }

    pub fn grant(&self, id: &PermissionId) -> bool {
        self.resolve(id, GateDecision::Allow)
    }

    pub fn deny(&self, id: &PermissionId) -> bool {
        self.resolve(id, GateDecision::Deny(DenyReason::Denied))
    }

    /// Requests still awaiting resolution, oldest first.
    pub fn pending(&self) -> Vec<PermissionRequest> {
        let inner = self.inner.lock();
        let mut requests: Vec<PermissionRequest> =
            inner.pending.values().map(|entry| entry.request.clone()).collect();
        requests.sort_by_key(|request| request.created_at_ms);
        requests
    }

    /// Abort path: resolve every ticket filed by `turn` as cancelled.
    pub fn cancel_turn(&self, turn: u64) -> usize {
        let entries: Vec<PendingEntry> = {
            let mut inner = self.inner.lock();
            let ids: Vec<PermissionId> = inner
                .pending
                .iter()
                .filter(|(_, entry)| entry.turn == turn)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter().filter_map(|id| inner.pending.remove(&id)).collect()
        };
        let count = entries.len();
        for entry in entries {
            let _ = entry.responder.send(GateDecision::Deny(DenyReason::Cancelled));
        }
        count
    }

    /// Periodic sweep: evict tickets whose waiter is gone or that have
    /// outlived the timeout without resolution.
    pub fn sweep(&self) -> usize {
        let now = self.clock.epoch_ms();
        let horizon_ms = self.timeout.as_millis() as u64;
        let mut inner = self.inner.lock();
        let doomed: Vec<PermissionId> = inner
            .pending
            .iter()
            .filter(|(_, entry)| {
                entry.responder.is_closed()
                    || now.saturating_sub(entry.request.created_at_ms) > horizon_ms
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            tracing::warn!(id = %id, "evicting abandoned permission request");
            inner.pending.remove(id);
        }
        doomed.len()
    }

    /// Remember a session-scoped capability approval.
    pub fn grant_session_capability(&self, token: &SessionToken, capability: &str) {
        self.inner
            .lock()
            .session_grants
            .entry(token.clone())
            .or_default()
            .insert(capability.to_string());
    }

    pub fn is_session_granted(&self, token: &SessionToken, capability: &str) -> bool {
        self.inner
            .lock()
            .session_grants
            .get(token)
            .is_some_and(|grants| grants.contains(capability))
    }

    /// Forget a session's approvals (on session delete).
    pub fn clear_session(&self, token: &SessionToken) {
        self.inner.lock().session_grants.remove(token);
    }
}

/// Gate bound to one agent + session for one turn.
///
/// Tier 1 (read-only) passes; Tier 2 (writes) passes on an allow-list
/// match and otherwise blocks on an approval ticket; Tier 3
/// (capabilities) auto-approves built-ins and caches session-scoped
/// approvals for the rest.
pub struct TurnGate<C: Clock> {
    broker: Arc<PermissionBroker<C>>,
    agent: AgentDef,
    token: Option<SessionToken>,
    turn: u64,
    cancel: CancellationToken,
    /// Approvals granted earlier in this same turn.
    turn_grants: Mutex<HashSet<String>>,
}

impl<C: Clock> TurnGate<C> {
    pub fn new(
        broker: Arc<PermissionBroker<C>>,
        agent: AgentDef,
        token: Option<SessionToken>,
        turn: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self { broker, agent, token, turn, cancel, turn_grants: Mutex::new(HashSet::new()) }
    }

    async fn gate_write(&self, tool: &str, input: &serde_json::Value) -> GateDecision {
        let target = write_target(tool, input);
        let patterns = if tool == "bash" {
            &self.agent.allowed_commands
        } else {
            &self.agent.allowed_paths
        };
        if matches_any(patterns, &target) {
            return GateDecision::Allow;
        }
        let request =
            PermissionRequest::new(tool, target, self.agent.name.clone(), self.broker.clock.epoch_ms());
        self.broker.wait(request, self.turn, &self.cancel).await
    }

    async fn gate_capability(&self, name: &str) -> GateDecision {
        if is_builtin_capability(name) {
            return GateDecision::Allow;
        }
        if self.turn_grants.lock().contains(name) {
            return GateDecision::Allow;
        }
        if let Some(token) = &self.token {
            if self.broker.is_session_granted(token, name) {
                return GateDecision::Allow;
            }
        }
        let request = PermissionRequest::new(
            name,
            name,
            self.agent.name.clone(),
            self.broker.clock.epoch_ms(),
        );
        let decision = self.broker.wait(request, self.turn, &self.cancel).await;
        if decision.is_allowed() {
            self.turn_grants.lock().insert(name.to_string());
            if let Some(token) = &self.token {
                self.broker.grant_session_capability(token, name);
            }
        }
        decision
    }
}

#[async_trait::async_trait]
impl<C: Clock> warden_adapters::PermissionGate for TurnGate<C> {
    async fn check(&self, tool: &str, input: &serde_json::Value) -> GateDecision {
        match classify(tool) {
            Tier::ReadOnly => GateDecision::Allow,
            Tier::Write => self.gate_write(tool, input).await,
            Tier::Capability => self.gate_capability(tool).await,
        }
    }
}

/// Target of a write operation: the command line for `bash`, the path
/// for file tools; falls back to the raw input for anything else.
fn write_target(tool: &str, input: &serde_json::Value) -> String {
    let key = if tool == "bash" { "command" } else { "path" };
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| input.to_string())
}

fn matches_any(patterns: &[String], target: &str) -> bool {
    patterns.iter().any(|raw| match Pattern::new(raw) {
        Ok(pattern) => pattern.matches(target),
        Err(e) => {
            tracing::warn!(pattern = %raw, error = %e, "invalid allow-list pattern ignored");
            false
        }
    })
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
