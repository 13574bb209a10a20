// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background loops: queue workers draining deferred items, the
//! periodic trigger scan, and the maintenance sweep. All loops stop on
//! one shared cancellation token.

use crate::config::WardenConfig;
use crate::orchestrator::{Orchestrator, TurnOptions, TurnOutcome};
use crate::triggers::{CTX_DOCUMENT, CTX_MESSAGE};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warden_adapters::ExecutionBackend;
use warden_core::{Clock, QueueItem};

/// Handles for the engine's background tasks.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the configured number of queue workers plus the scanner
    /// and sweep loops.
    pub fn start<B: ExecutionBackend, C: Clock>(
        orch: Arc<Orchestrator<B, C>>,
        config: &WardenConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        for worker in 0..config.worker_concurrency.max(1) {
            handles.push(tokio::spawn(worker_loop(
                Arc::clone(&orch),
                worker,
                config.worker_poll(),
                cancel.clone(),
            )));
        }
        handles.push(tokio::spawn(scanner_loop(
            Arc::clone(&orch),
            config.scan_interval(),
            cancel.clone(),
        )));
        handles.push(tokio::spawn(sweep_loop(orch, config.scan_interval(), cancel.clone())));
        Self { cancel, handles }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop every loop and wait for them to finish. A worker mid-item
    /// finishes recording that item's outcome before exiting.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop<B: ExecutionBackend, C: Clock>(
    orch: Arc<Orchestrator<B, C>>,
    worker: usize,
    poll: Duration,
    cancel: CancellationToken,
) {
    tracing::debug!(worker, "queue worker started");
    loop {
        let claimed = match orch.queue().claim_next() {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(worker, error = %e, "queue claim failed");
                None
            }
        };
        match claimed {
            Some(item) => process_item(&orch, item).await,
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll) => {}
                }
            }
        }
        if cancel.is_cancelled() {
            break;
        }
    }
    tracing::debug!(worker, "queue worker stopped");
}

/// Run one claimed item to completion and record the outcome on the
/// queue and, for trigger-driven items, on the document attachment.
async fn process_item<B: ExecutionBackend, C: Clock>(
    orch: &Orchestrator<B, C>,
    item: QueueItem,
) {
    let Some(message) = item.context.get(CTX_MESSAGE).cloned() else {
        tracing::warn!(item_id = %item.id, "item carries no message");
        if let Err(e) = orch.queue().mark_failed(&item.id, "missing message context") {
            tracing::error!(item_id = %item.id, error = %e, "could not record item outcome");
        }
        return;
    };
    tracing::info!(item_id = %item.id, agent = %item.agent, depth = item.depth,
        "running queued item");

    let opts = TurnOptions::default().depth(item.depth).parent(item.id.clone());
    let run: Result<String, String> =
        match orch.run_turn_blocking(&item.agent, &message, opts).await {
            Ok(TurnOutcome::Completed { text, .. }) => Ok(text),
            Ok(TurnOutcome::SessionUnavailable { .. }) => Err("session unavailable".to_string()),
            Ok(TurnOutcome::Failed { message }) => Err(message),
            Err(e) => Err(e.to_string()),
        };

    let recorded = match &run {
        Ok(text) => orch.queue().mark_completed(&item.id, text.clone()),
        Err(error) => orch.queue().mark_failed(&item.id, error.clone()),
    };
    if let Err(e) = recorded {
        tracing::error!(item_id = %item.id, error = %e, "could not record item outcome");
    }

    if let Some(document) = item.context.get(CTX_DOCUMENT) {
        let path = PathBuf::from(document);
        if let Err(e) = orch.scanner().complete(&path, &item.agent, run.map(|_| ())) {
            tracing::warn!(document = %path.display(), agent = %item.agent, error = %e,
                "could not record attachment outcome");
        }
    }
}

async fn scanner_loop<B: ExecutionBackend, C: Clock>(
    orch: Arc<Orchestrator<B, C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        match orch.scan_cycle() {
            Ok(enqueued) if enqueued > 0 => {
                tracing::debug!(enqueued, "trigger scan enqueued work")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "trigger scan failed"),
        }
    }
}

async fn sweep_loop<B: ExecutionBackend, C: Clock>(
    orch: Arc<Orchestrator<B, C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        orch.sweep();
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
