// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`ExecutionBackend`] trait and its wire types.

use crate::gate::PermissionGate;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use warden_core::SessionToken;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend no longer holds state for the supplied token. The
    /// caller can recover by starting a fresh session from its own
    /// transcript, so this is kept distinct from other failures.
    #[error("session not resumable: {0}")]
    SessionNotResumable(SessionToken),
    #[error("turn cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Other(String),
}

/// One turn of work handed to the backend.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Name of the agent being run, for logging only.
    pub agent: String,
    /// System instructions for the agent.
    pub instructions: String,
    /// The user message for this turn.
    pub message: String,
    /// Capability names the agent is allowed to use.
    pub capabilities: Vec<String>,
    /// Resume an existing backend session; None starts a fresh one.
    pub resume_token: Option<SessionToken>,
    /// Working-directory override for execution.
    pub cwd: Option<PathBuf>,
}

impl TurnRequest {
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            instructions: String::new(),
            message: message.into(),
            capabilities: Vec::new(),
            resume_token: None,
            cwd: None,
        }
    }

    warden_core::setters! {
        into {
            instructions: String,
        }
        set {
            capabilities: Vec<String>,
        }
        option {
            resume_token: SessionToken,
            cwd: PathBuf,
        }
    }
}

/// Progress reported by the backend while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Turn startup: the capability names actually available.
    Init { capabilities: Vec<String> },
    /// Incremental assistant text.
    Text { delta: String },
    /// The agent invoked a tool.
    ToolUse { id: String, name: String, input: serde_json::Value },
    /// Result of a tool invocation (including gate denials).
    ToolResult { id: String, content: String, is_error: bool },
}

/// Final result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// Full assistant text for the turn.
    pub text: String,
    /// Token identifying the backend-side session; issued on the first
    /// turn and stable thereafter.
    pub session_token: SessionToken,
}

/// A conversation runtime that owns session state on its side.
///
/// Implementations must consult `gate` before executing any tool the
/// agent requests, and emit progress on `events` as it happens. The
/// returned [`TurnReply`] carries the backend's session token; for a
/// resumed turn it matches the request's `resume_token`.
#[async_trait]
pub trait ExecutionBackend: Send + Sync + 'static {
    async fn run_turn(
        &self,
        request: TurnRequest,
        gate: Arc<dyn PermissionGate>,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TurnReply, BackendError>;
}
