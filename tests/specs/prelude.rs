// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the specs.

pub use std::path::PathBuf;
pub use std::sync::Arc;
pub use std::time::Duration;

pub use tempfile::TempDir;
pub use tokio_util::sync::CancellationToken;
pub use warden_adapters::{BackendError, BackendEvent, FakeBackend, FakeTurn};
pub use warden_core::{
    AgentAttachment, AgentDef, AgentKind, AttachmentStatus, EnqueueOptions, FakeClock, ItemStatus,
    Priority, Role, SessionToken, Trigger,
};
pub use warden_engine::triggers::{CTX_DOCUMENT, CTX_MESSAGE};
pub use warden_engine::{
    AgentCatalog, Orchestrator, TurnOptions, TurnOutcome, WardenConfig, WorkerPool,
};

/// 2023-11-14T22:13:20Z, a plain weekday afternoon.
pub const EPOCH: u64 = 1_700_000_000_000;

pub type Engine = Orchestrator<FakeBackend, FakeClock>;

/// A reply where the scribe spawns another scribe turn.
pub const SPAWN_SCRIBE: &str =
    "Chaining.\n```spawn\nagent = \"scribe\"\nmessage = \"keep going\"\n```\n";

pub fn catalog() -> AgentCatalog {
    let mut catalog = AgentCatalog::new();
    catalog
        .insert(
            AgentDef::new("scribe", AgentKind::Conversational, "Take notes.")
                .can_spawn(true)
                .allowed_paths(vec!["notes/**".to_string()]),
        )
        .unwrap();
    catalog.insert(AgentDef::new("courier", AgentKind::Standalone, "Deliver things.")).unwrap();
    catalog
        .insert(AgentDef::new(
            "digest",
            AgentKind::DocumentBound { document: "notes/daily.md".into() },
            "Summarize the document.",
        ))
        .unwrap();
    catalog
}

pub struct Spec {
    pub backend: FakeBackend,
    pub clock: FakeClock,
    pub config: WardenConfig,
    pub orch: Arc<Engine>,
    _dir: TempDir,
}

impl Spec {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let clock = FakeClock::at_epoch_ms(EPOCH);
        let config = WardenConfig {
            state_dir: dir.path().join("state"),
            worker_poll_ms: 10,
            scan_interval_secs: 1,
            ..WardenConfig::default()
        };
        let orch =
            Arc::new(Orchestrator::new(&config, backend.clone(), catalog(), clock.clone()));
        Spec { backend, clock, config, orch, _dir: dir }
    }

    /// A fresh orchestrator over the same durable state, as after a
    /// process restart. The in-memory backend survives so scripted
    /// turns and recorded calls carry over.
    pub fn reopen(&self) -> Arc<Engine> {
        let orch = Arc::new(Orchestrator::new(
            &self.config,
            self.backend.clone(),
            catalog(),
            self.clock.clone(),
        ));
        orch.bootstrap().unwrap();
        orch
    }
}

/// Wait (under paused time) until at least `terminal` queue items have
/// reached a terminal status.
pub async fn settled(orch: &Engine, terminal: usize) {
    for _ in 0..500 {
        let state = orch.queue_state();
        if state.completed + state.failed >= terminal {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue items did not settle");
}

/// Unwrap a completed outcome.
pub fn completed(outcome: TurnOutcome) -> SessionToken {
    match outcome {
        TurnOutcome::Completed { token, .. } => token,
        other => panic!("expected completed turn, got {other:?}"),
    }
}
