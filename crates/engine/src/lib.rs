// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The warden engine: session manager, work queue, trigger scanner,
//! and execution orchestrator, plus the worker loops that drive them.
//!
//! The orchestrator composes everything else. The queue and scanner
//! are leaves; the session manager stands alone. Callers hold an
//! [`Orchestrator`] and go through its methods; the submodules are the
//! implementation seams.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod catalog;
pub mod config;
pub mod orchestrator;
pub mod queue;
pub mod sessions;
pub mod triggers;
pub mod worker;

pub use catalog::{AgentCatalog, CatalogError};
pub use config::{ConfigError, WardenConfig};
pub use orchestrator::{
    Orchestrator, OrchestratorError, PermissionBroker, TurnOptions, TurnOutcome,
};
pub use queue::{QueueError, QueueState, WorkQueue};
pub use sessions::{ResumeInfo, ResumeSource, SessionError, SessionManager};
pub use triggers::{ScanError, TriggerScanner};
pub use worker::WorkerPool;
