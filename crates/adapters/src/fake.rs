// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted backend and gate for tests.

use crate::backend::{BackendError, BackendEvent, ExecutionBackend, TurnReply, TurnRequest};
use crate::gate::PermissionGate;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use warden_core::{GateDecision, SessionToken};

/// Recorded backend invocation
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub agent: String,
    pub message: String,
    pub resume_token: Option<SessionToken>,
}

/// Script for one turn: tool invocations to attempt, then the outcome.
#[derive(Debug)]
pub struct FakeTurn {
    tool_uses: Vec<(String, serde_json::Value)>,
    reply: Result<String, BackendError>,
}

impl FakeTurn {
    /// A turn completing with the given assistant text.
    pub fn replying(text: impl Into<String>) -> Self {
        Self { tool_uses: Vec::new(), reply: Ok(text.into()) }
    }

    /// A turn that fails with the given error.
    pub fn failing(error: BackendError) -> Self {
        Self { tool_uses: Vec::new(), reply: Err(error) }
    }

    /// Attempt a tool invocation (screened through the gate) before the
    /// turn completes.
    pub fn tool_use(mut self, name: impl Into<String>, input: serde_json::Value) -> Self {
        self.tool_uses.push((name.into(), input));
        self
    }
}

struct FakeBackendState {
    script: VecDeque<FakeTurn>,
    calls: Vec<BackendCall>,
    next_token: u64,
}

/// Fake execution backend driven by a per-turn script.
///
/// Each `run_turn` consumes the next scripted turn; an empty script
/// yields a plain "ok" reply. Fresh sessions get tokens of the form
/// `fake-sess-N`; resumed turns echo the supplied token back.
#[derive(Clone)]
pub struct FakeBackend {
    inner: Arc<Mutex<FakeBackendState>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBackendState {
                script: VecDeque::new(),
                calls: Vec::new(),
                next_token: 1,
            })),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted turn.
    pub fn push_turn(&self, turn: FakeTurn) {
        self.inner.lock().script.push_back(turn);
    }

    /// Queue a turn that simply replies with `text`.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.push_turn(FakeTurn::replying(text));
    }

    /// Queue a turn that fails with `error`.
    pub fn push_error(&self, error: BackendError) {
        self.push_turn(FakeTurn::failing(error));
    }

    /// Get all recorded invocations.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    async fn run_turn(
        &self,
        request: TurnRequest,
        gate: Arc<dyn PermissionGate>,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TurnReply, BackendError> {
        // Pop everything under the lock before the first await.
        let (turn, token) = {
            let mut state = self.inner.lock();
            state.calls.push(BackendCall {
                agent: request.agent.clone(),
                message: request.message.clone(),
                resume_token: request.resume_token.clone(),
            });
            let turn = state
                .script
                .pop_front()
                .unwrap_or_else(|| FakeTurn::replying("ok"));
            let token = match &request.resume_token {
                Some(token) => token.clone(),
                None => {
                    let n = state.next_token;
                    state.next_token += 1;
                    SessionToken::new(format!("fake-sess-{n}"))
                }
            };
            (turn, token)
        };

        let _ = events
            .send(BackendEvent::Init { capabilities: request.capabilities.clone() })
            .await;

        for (i, (name, input)) in turn.tool_uses.into_iter().enumerate() {
            let id = format!("tool-{i}");
            let _ = events
                .send(BackendEvent::ToolUse { id: id.clone(), name: name.clone(), input: input.clone() })
                .await;
            let result = match gate.check(&name, &input).await {
                GateDecision::Allow => BackendEvent::ToolResult {
                    id,
                    content: format!("{name}: done"),
                    is_error: false,
                },
                GateDecision::Deny(reason) => BackendEvent::ToolResult {
                    id,
                    content: reason.to_string(),
                    is_error: true,
                },
            };
            let _ = events.send(result).await;
        }

        match turn.reply {
            Ok(text) => {
                let _ = events.send(BackendEvent::Text { delta: text.clone() }).await;
                Ok(TurnReply { text, session_token: token })
            }
            Err(error) => Err(error),
        }
    }
}

/// Gate with a fixed decision table, recording every check.
pub struct StaticGate {
    default: GateDecision,
    per_tool: HashMap<String, GateDecision>,
    checks: Mutex<Vec<String>>,
}

impl StaticGate {
    pub fn allow_all() -> Self {
        Self { default: GateDecision::Allow, per_tool: HashMap::new(), checks: Mutex::new(Vec::new()) }
    }

    pub fn deny_all(reason: warden_core::DenyReason) -> Self {
        Self {
            default: GateDecision::Deny(reason),
            per_tool: HashMap::new(),
            checks: Mutex::new(Vec::new()),
        }
    }

    /// Override the decision for one tool name.
    pub fn with_tool(mut self, tool: impl Into<String>, decision: GateDecision) -> Self {
        self.per_tool.insert(tool.into(), decision);
        self
    }

    /// Tool names checked so far, in order.
    pub fn checked(&self) -> Vec<String> {
        self.checks.lock().clone()
    }
}

#[async_trait]
impl PermissionGate for StaticGate {
    async fn check(&self, tool: &str, _input: &serde_json::Value) -> GateDecision {
        self.checks.lock().push(tool.to_string());
        self.per_tool.get(tool).unwrap_or(&self.default).clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
