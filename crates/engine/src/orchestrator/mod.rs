// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution orchestrator: turns a queued or immediate request into a
//! completed or failed conversation turn.
//!
//! One state machine serves both entry points: the streaming call
//! observes it incrementally through a caller-supplied sink; the
//! blocking call simply drains the stream. Permission gating, session
//! resolution, and spawn-directive handling all happen here.

pub mod gate;
pub mod spawn;

pub use gate::{PermissionBroker, TurnGate};
pub use spawn::{parse_spawn_directives, SpawnDirective};

use crate::catalog::AgentCatalog;
use crate::config::WardenConfig;
use crate::queue::{QueueError, QueueState, WorkQueue};
use crate::sessions::{SessionError, SessionManager};
use crate::triggers::{ScanError, TriggerScanner, CTX_MESSAGE};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use warden_adapters::{
    BackendError, BackendEvent, ExecutionBackend, PermissionGate, TurnReply, TurnRequest,
};
use warden_core::{
    AgentDef, Clock, EnqueueOptions, ItemId, PermissionId, PermissionRequest, Role, Session,
    SessionMeta, SessionToken,
};
use warden_storage::{DocumentStore, QueueStore, SessionStore};

/// Errors from orchestrator entry points
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Final result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        token: SessionToken,
        text: String,
        /// Child items enqueued from spawn directives.
        spawned: Vec<ItemId>,
    },
    /// The backend no longer holds the session. Carries enough for the
    /// caller to choose recovery: re-inject history or start fresh.
    SessionUnavailable { message_count: usize, has_local_history: bool },
    Failed { message: String },
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

/// Caller-supplied options for one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Resume this session; None starts a new one.
    pub token: Option<SessionToken>,
    /// Recursion depth of the request (queued children carry theirs).
    pub depth: u8,
    /// Queue item this turn belongs to, recorded on spawned children.
    pub parent: Option<ItemId>,
}

impl TurnOptions {
    warden_core::setters! {
        set {
            depth: u8,
        }
        option {
            token: SessionToken,
            parent: ItemId,
        }
    }
}

/// Composes the session manager, queue, scanner, and backend into the
/// caller-facing surface.
pub struct Orchestrator<B: ExecutionBackend, C: Clock> {
    backend: Arc<B>,
    sessions: Arc<SessionManager<C>>,
    queue: Arc<WorkQueue<C>>,
    scanner: Arc<TriggerScanner<C>>,
    catalog: Arc<AgentCatalog>,
    broker: Arc<PermissionBroker<C>>,
    clock: C,
}

impl<B: ExecutionBackend, C: Clock> Orchestrator<B, C> {
    pub fn new(config: &WardenConfig, backend: B, catalog: AgentCatalog, clock: C) -> Self {
        let sessions = Arc::new(SessionManager::new(
            SessionStore::new(&config.state_dir),
            clock.clone(),
            config.index_max,
            config.cache_max_age_ms(),
            config.lock_timeout(),
        ));
        let queue = Arc::new(WorkQueue::new(
            QueueStore::new(&config.state_dir),
            clock.clone(),
            config.queue_capacity,
            config.retention,
            config.max_depth,
        ));
        let scanner =
            Arc::new(TriggerScanner::new(DocumentStore::new(&config.state_dir), clock.clone()));
        let broker = Arc::new(PermissionBroker::new(
            clock.clone(),
            config.permission_timeout(),
            config.max_pending_permissions,
        ));
        Self {
            backend: Arc::new(backend),
            sessions,
            queue,
            scanner,
            catalog: Arc::new(catalog),
            broker,
            clock,
        }
    }

    /// Restore durable state after a restart: queue snapshot (running
    /// items reset to pending) and the session index.
    pub fn bootstrap(&self) -> Result<(), OrchestratorError> {
        let items = self.queue.restore()?;
        let sessions = self.sessions.rebuild_index()?;
        tracing::info!(items, sessions, "restored durable state");
        Ok(())
    }

    /// Run one turn to completion, discarding intermediate events.
    pub async fn run_turn_blocking(
        &self,
        agent: &str,
        message: &str,
        opts: TurnOptions,
    ) -> Result<TurnOutcome, OrchestratorError> {
        self.execute(agent, message, opts, None, CancellationToken::new()).await
    }

    /// Run one turn, forwarding backend events to `sink` as they occur.
    /// Dropping the receiving end stops forwarding but not the turn;
    /// cancelling `cancel` aborts the turn itself.
    pub async fn run_turn_streaming(
        &self,
        agent: &str,
        message: &str,
        opts: TurnOptions,
        sink: mpsc::Sender<BackendEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, OrchestratorError> {
        self.execute(agent, message, opts, Some(sink), cancel).await
    }

    /// The shared turn state machine.
    async fn execute(
        &self,
        agent_name: &str,
        message: &str,
        opts: TurnOptions,
        sink: Option<mpsc::Sender<BackendEvent>>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, OrchestratorError> {
        if message.trim().is_empty() {
            return Err(OrchestratorError::EmptyMessage);
        }
        let agent = self
            .catalog
            .get(agent_name)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_name.to_string()))?
            .clone();
        let (mut session, resume) = self.sessions.get_or_create(opts.token.as_ref(), &agent.name)?;
        tracing::debug!(agent = %agent.name, source = ?resume.source,
            prior = resume.prior_messages, "starting turn");

        let turn = self.broker.begin_turn();
        let gate: Arc<dyn PermissionGate> = Arc::new(TurnGate::new(
            Arc::clone(&self.broker),
            agent.clone(),
            session.token.clone(),
            turn,
            cancel.clone(),
        ));

        let (event_tx, event_rx) = mpsc::channel(64);
        let forwarder = sink.map(|sink| {
            tokio::spawn(async move {
                let mut event_rx = event_rx;
                while let Some(event) = event_rx.recv().await {
                    if sink.send(event).await.is_err() {
                        break;
                    }
                }
            })
        });

        let mut request = TurnRequest::new(&agent.name, message)
            .instructions(&agent.instructions)
            .capabilities(agent.capabilities.clone());
        if let Some(token) = &session.token {
            request = request.resume_token(token.clone());
        }
        if let Some(cwd) = &session.cwd {
            request = request.cwd(cwd.clone());
        }

        let result = tokio::select! {
            result = self.backend.run_turn(request, gate, event_tx) => result,
            _ = cancel.cancelled() => {
                let resolved = self.broker.cancel_turn(turn);
                tracing::info!(agent = %agent.name, resolved,
                    "turn aborted; partial output discarded");
                return Ok(TurnOutcome::Failed { message: "turn cancelled".to_string() });
            }
        };
        if let Some(handle) = forwarder {
            let _ = handle.await;
        }
        // A cancel racing the backend's final poll still aborts the turn.
        if cancel.is_cancelled() {
            let resolved = self.broker.cancel_turn(turn);
            tracing::info!(agent = %agent.name, resolved,
                "turn aborted; partial output discarded");
            return Ok(TurnOutcome::Failed { message: "turn cancelled".to_string() });
        }

        match result {
            Ok(reply) => self.complete_turn(&agent, &mut session, message, reply, &opts).await,
            Err(BackendError::SessionNotResumable(token)) => {
                tracing::warn!(agent = %agent.name, token = %token,
                    "backend cannot resume session");
                Ok(TurnOutcome::SessionUnavailable {
                    message_count: session.messages.len(),
                    has_local_history: !session.messages.is_empty(),
                })
            }
            Err(e) => {
                self.broker.cancel_turn(turn);
                tracing::warn!(agent = %agent.name, error = %e, "turn failed");
                Ok(TurnOutcome::Failed { message: e.to_string() })
            }
        }
    }

    /// Persist the exchange and act on spawn directives.
    async fn complete_turn(
        &self,
        agent: &AgentDef,
        session: &mut Session,
        message: &str,
        reply: TurnReply,
        opts: &TurnOptions,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let token = reply.session_token.clone();
        if session.token.is_none() {
            // First completed turn: messages land together with the
            // one-time finalize write.
            let now = self.clock.epoch_ms();
            session.push_message(Role::User, message, now);
            session.push_message(Role::Assistant, reply.text.clone(), now);
            self.sessions.finalize(session, token.clone()).await?;
        } else {
            self.sessions.append_message(&token, Role::User, message).await?;
            self.sessions.append_message(&token, Role::Assistant, reply.text.clone()).await?;
        }
        let spawned = self.process_spawns(agent, &reply.text, opts);
        Ok(TurnOutcome::Completed { token, text: reply.text, spawned })
    }

    /// Enqueue children for each directive, subject to permission to
    /// spawn and the remaining depth budget.
    fn process_spawns(&self, agent: &AgentDef, text: &str, opts: &TurnOptions) -> Vec<ItemId> {
        let directives = parse_spawn_directives(text);
        if directives.is_empty() {
            return Vec::new();
        }
        if !agent.can_spawn {
            tracing::warn!(agent = %agent.name, dropped = directives.len(),
                "agent may not spawn; directives dropped");
            return Vec::new();
        }
        let mut spawned = Vec::new();
        for directive in directives {
            if self.catalog.get(&directive.agent).is_none() {
                tracing::warn!(agent = %agent.name, target = %directive.agent,
                    "spawn directive names unknown agent, dropped");
                continue;
            }
            let mut context = HashMap::new();
            context.insert(CTX_MESSAGE.to_string(), directive.message);
            let mut enqueue_opts =
                EnqueueOptions::default().priority(directive.priority).depth(opts.depth + 1);
            if let Some(parent) = &opts.parent {
                enqueue_opts = enqueue_opts.parent(parent.clone());
            }
            match self.queue.enqueue(directive.agent.clone(), context, enqueue_opts) {
                Ok(id) => spawned.push(id),
                Err(QueueError::DepthExceeded { depth, max }) => {
                    tracing::warn!(agent = %agent.name, target = %directive.agent, depth, max,
                        "spawn beyond depth limit dropped");
                }
                Err(e) => {
                    tracing::warn!(agent = %agent.name, target = %directive.agent, error = %e,
                        "spawn enqueue failed");
                }
            }
        }
        spawned
    }

    /// Queue deferred work for a known agent.
    pub fn enqueue(
        &self,
        agent: &str,
        message: impl Into<String>,
        opts: EnqueueOptions,
    ) -> Result<ItemId, OrchestratorError> {
        if self.catalog.get(agent).is_none() {
            return Err(OrchestratorError::UnknownAgent(agent.to_string()));
        }
        let mut context = HashMap::new();
        context.insert(CTX_MESSAGE.to_string(), message.into());
        Ok(self.queue.enqueue(agent, context, opts)?)
    }

    pub fn grant_permission(&self, id: &PermissionId) -> bool {
        self.broker.grant(id)
    }

    pub fn deny_permission(&self, id: &PermissionId) -> bool {
        self.broker.deny(id)
    }

    pub fn pending_permissions(&self) -> Vec<PermissionRequest> {
        self.broker.pending()
    }

    pub fn list_sessions(&self, include_archived: bool) -> Vec<SessionMeta> {
        self.sessions.list(include_archived)
    }

    pub fn get_session(&self, token: &SessionToken) -> Result<Session, OrchestratorError> {
        Ok(self.sessions.get(token)?)
    }

    pub async fn archive_session(&self, token: &SessionToken) -> Result<(), OrchestratorError> {
        Ok(self.sessions.archive(token).await?)
    }

    pub async fn unarchive_session(&self, token: &SessionToken) -> Result<(), OrchestratorError> {
        Ok(self.sessions.unarchive(token).await?)
    }

    /// Delete a session and forget its capability approvals.
    pub async fn delete_session(&self, token: &SessionToken) -> Result<(), OrchestratorError> {
        self.sessions.delete(token).await?;
        self.broker.clear_session(token);
        Ok(())
    }

    pub fn trigger_document(&self, path: &Path) -> Result<usize, OrchestratorError> {
        Ok(self.scanner.trigger_document(path)?)
    }

    pub fn reset_agents(&self, path: &Path) -> Result<usize, OrchestratorError> {
        Ok(self.scanner.reset_agents(path)?)
    }

    pub fn queue_state(&self) -> QueueState {
        self.queue.queue_state()
    }

    /// One trigger scan pass; used by the scanner loop and tests.
    pub fn scan_cycle(&self) -> Result<usize, OrchestratorError> {
        Ok(self.scanner.scan_cycle(&self.queue)?)
    }

    /// Periodic maintenance: stale hot sessions + abandoned tickets.
    pub fn sweep(&self) {
        self.sessions.evict_stale();
        self.broker.sweep();
    }

    pub fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }

    pub fn queue(&self) -> &WorkQueue<C> {
        &self.queue
    }

    pub fn scanner(&self) -> &TriggerScanner<C> {
        &self.scanner
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
