// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger scanner: time/event activation of agent-document pairs.
//!
//! Each scan cycle is two passes. First, triggers of `pending`
//! attachments are evaluated and qualifying ones become `needs_run`.
//! Second, every `needs_run` attachment is moved to `running` and a
//! queue item is enqueued for it. Completion transitions are driven by
//! the worker when the item finishes.

use crate::queue::{QueueError, WorkQueue};
use std::path::Path;
use thiserror::Error;
use warden_core::{AgentAttachment, Clock, DocumentAgents, EnqueueOptions, TriggerError};
use warden_storage::{DocumentStore, StorageError};

/// Context key carrying the document path on enqueued trigger runs.
pub const CTX_DOCUMENT: &str = "document";
/// Context key carrying the message for a queued turn.
pub const CTX_MESSAGE: &str = "message";

/// Errors from scanner operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no agents attached to document: {0}")]
    UnknownDocument(String),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Scans document attachments and drives their run state machine.
pub struct TriggerScanner<C: Clock> {
    docs: DocumentStore,
    clock: C,
}

impl<C: Clock> TriggerScanner<C> {
    pub fn new(docs: DocumentStore, clock: C) -> Self {
        Self { docs, clock }
    }

    /// Attach an agent to a document (replacing a same-name attachment),
    /// validating the trigger first.
    pub fn attach(&self, path: &Path, attachment: AgentAttachment) -> Result<(), ScanError> {
        attachment.trigger.validate()?;
        let mut doc = self
            .docs
            .load(path)?
            .unwrap_or_else(|| DocumentAgents::new(path));
        doc.attach(attachment);
        self.docs.save(&doc)?;
        Ok(())
    }

    /// One scan pass over every document. Returns how many attachments
    /// were enqueued.
    pub fn scan_cycle(&self, queue: &WorkQueue<C>) -> Result<usize, ScanError> {
        let now = self.clock.epoch_ms();
        let mut enqueued = 0;
        for mut doc in self.docs.scan()? {
            let mut dirty = false;
            for attachment in &mut doc.attachments {
                if attachment.trigger.should_fire(attachment.last_run_ms, now)
                    && attachment.mark_needs_run()
                {
                    tracing::debug!(document = %doc.path.display(), agent = %attachment.agent,
                        trigger = %attachment.trigger, "trigger fired");
                    dirty = true;
                }
            }
            enqueued += self.dispatch(&mut doc, queue, &mut dirty);
            if dirty {
                self.docs.save(&doc)?;
            }
        }
        Ok(enqueued)
    }

    /// Move every `needs_run` attachment to `running` and enqueue its
    /// work item. A full queue leaves the attachment in `needs_run` so
    /// the next cycle retries.
    fn dispatch(&self, doc: &mut DocumentAgents, queue: &WorkQueue<C>, dirty: &mut bool) -> usize {
        let mut enqueued = 0;
        let path = doc.path.display().to_string();
        for attachment in &mut doc.attachments {
            if !attachment.start() {
                continue;
            }
            *dirty = true;
            let mut context = std::collections::HashMap::new();
            context.insert(CTX_DOCUMENT.to_string(), path.clone());
            context.insert(
                CTX_MESSAGE.to_string(),
                format!("Scheduled run for document {path}"),
            );
            match queue.enqueue(attachment.agent.clone(), context, EnqueueOptions::default()) {
                Ok(_) => enqueued += 1,
                Err(QueueError::Full(pending)) => {
                    tracing::warn!(document = %path, agent = %attachment.agent, pending,
                        "queue full, trigger run deferred");
                    attachment.status = warden_core::AttachmentStatus::NeedsRun;
                }
                Err(e) => {
                    tracing::warn!(document = %path, agent = %attachment.agent, error = %e,
                        "failed to enqueue trigger run");
                    attachment.finish(Err(e.to_string()), self.clock.epoch_ms());
                }
            }
        }
        enqueued
    }

    /// Explicit activation: move every `pending` attachment of one
    /// document to `needs_run` regardless of trigger kind. This is the
    /// only scanner path for manual and event-driven triggers.
    pub fn trigger_document(&self, path: &Path) -> Result<usize, ScanError> {
        let mut doc = self.load_known(path)?;
        let moved = doc.attachments.iter_mut().map(|a| a.mark_needs_run()).filter(|moved| *moved).count();
        self.docs.save(&doc)?;
        tracing::info!(document = %path.display(), moved, "document triggered");
        Ok(moved)
    }

    /// Return every attachment of a document to `pending`.
    pub fn reset_agents(&self, path: &Path) -> Result<usize, ScanError> {
        let mut doc = self.load_known(path)?;
        for attachment in &mut doc.attachments {
            attachment.reset();
        }
        let count = doc.attachments.len();
        self.docs.save(&doc)?;
        Ok(count)
    }

    /// Record the outcome of a finished trigger run.
    pub fn complete(
        &self,
        path: &Path,
        agent: &str,
        result: Result<(), String>,
    ) -> Result<(), ScanError> {
        let mut doc = self.load_known(path)?;
        match doc.attachment_mut(agent) {
            Some(attachment) => attachment.finish(result, self.clock.epoch_ms()),
            None => return Err(ScanError::UnknownDocument(format!("{}#{agent}", path.display()))),
        }
        self.docs.save(&doc)?;
        Ok(())
    }

    /// Current attachment records for a document.
    pub fn document(&self, path: &Path) -> Result<DocumentAgents, ScanError> {
        self.load_known(path)
    }

    fn load_known(&self, path: &Path) -> Result<DocumentAgents, ScanError> {
        self.docs
            .load(path)?
            .ok_or_else(|| ScanError::UnknownDocument(path.display().to_string()))
    }
}

#[cfg(test)]
#[path = "triggers_tests.rs"]
mod tests;
