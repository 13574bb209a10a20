// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ScanError, TriggerScanner, CTX_DOCUMENT};
use crate::queue::WorkQueue;
use std::path::Path;
use warden_core::{AgentAttachment, AttachmentStatus, Clock, FakeClock, Trigger};
use warden_storage::{DocumentStore, QueueStore};

const DOC: &str = "/notes/standup.md";

struct Fixture {
    scanner: TriggerScanner<FakeClock>,
    queue: WorkQueue<FakeClock>,
    clock: FakeClock,
}

fn fixture(root: &Path, queue_capacity: usize) -> Fixture {
    let clock = FakeClock::at_epoch_ms(10 * 60 * 60 * 1000);
    Fixture {
        scanner: TriggerScanner::new(DocumentStore::new(root), clock.clone()),
        queue: WorkQueue::new(QueueStore::new(root), clock.clone(), queue_capacity, 50, 3),
        clock,
    }
}

fn status(f: &Fixture, agent: &str) -> AttachmentStatus {
    f.scanner.document(Path::new(DOC)).unwrap().attachment(agent).unwrap().status
}

#[test]
fn hourly_trigger_enqueues_run_with_document_context() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("scribe", Trigger::Hourly)).unwrap();

    let enqueued = f.scanner.scan_cycle(&f.queue).unwrap();

    assert_eq!(enqueued, 1);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Running);
    let item = f.queue.get_next().unwrap();
    assert_eq!(item.agent, "scribe");
    assert_eq!(item.context.get(CTX_DOCUMENT).map(String::as_str), Some(DOC));
}

#[test]
fn recent_run_does_not_refire() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    let mut attachment = AgentAttachment::new("scribe", Trigger::Hourly);
    // Ran 30 minutes ago.
    attachment.last_run_ms = Some(f.clock.epoch_ms() - 30 * 60 * 1000);
    f.scanner.attach(Path::new(DOC), attachment).unwrap();

    assert_eq!(f.scanner.scan_cycle(&f.queue).unwrap(), 0);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Pending);
}

#[test]
fn manual_trigger_never_fires_from_the_scanner() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("scribe", Trigger::Manual)).unwrap();

    assert_eq!(f.scanner.scan_cycle(&f.queue).unwrap(), 0);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Pending);

    // Explicit activation moves it; the next cycle dispatches it.
    assert_eq!(f.scanner.trigger_document(Path::new(DOC)).unwrap(), 1);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::NeedsRun);
    assert_eq!(f.scanner.scan_cycle(&f.queue).unwrap(), 1);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Running);
}

#[test]
fn full_queue_defers_the_run_until_a_later_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 1);
    // Fill the queue.
    f.queue
        .enqueue("blocker", std::collections::HashMap::new(), Default::default())
        .unwrap();
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("scribe", Trigger::Hourly)).unwrap();

    assert_eq!(f.scanner.scan_cycle(&f.queue).unwrap(), 0);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::NeedsRun);

    // Queue drains; the deferred run goes out on the next cycle.
    let blocker = f.queue.claim_next().unwrap().unwrap();
    f.queue.mark_completed(&blocker.id, "done").unwrap();
    assert_eq!(f.scanner.scan_cycle(&f.queue).unwrap(), 1);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Running);
}

#[test]
fn completion_and_error_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("scribe", Trigger::Hourly)).unwrap();
    f.scanner.scan_cycle(&f.queue).unwrap();

    f.scanner.complete(Path::new(DOC), "scribe", Ok(())).unwrap();
    let doc = f.scanner.document(Path::new(DOC)).unwrap();
    let attachment = doc.attachment("scribe").unwrap();
    assert_eq!(attachment.status, AttachmentStatus::Completed);
    assert_eq!(attachment.last_run_ms, Some(f.clock.epoch_ms()));

    // A later failed run records the error.
    f.scanner.reset_agents(Path::new(DOC)).unwrap();
    f.clock.advance(std::time::Duration::from_secs(2 * 60 * 60));
    f.scanner.scan_cycle(&f.queue).unwrap();
    f.scanner.complete(Path::new(DOC), "scribe", Err("turn failed".into())).unwrap();
    let doc = f.scanner.document(Path::new(DOC)).unwrap();
    assert_eq!(doc.attachment("scribe").unwrap().status, AttachmentStatus::Error);
    assert_eq!(doc.attachment("scribe").unwrap().last_error.as_deref(), Some("turn failed"));
}

#[test]
fn reset_returns_all_attachments_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("scribe", Trigger::Hourly)).unwrap();
    f.scanner.attach(Path::new(DOC), AgentAttachment::new("auditor", Trigger::Manual)).unwrap();
    f.scanner.scan_cycle(&f.queue).unwrap();
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Running);

    assert_eq!(f.scanner.reset_agents(Path::new(DOC)).unwrap(), 2);
    assert_eq!(status(&f, "scribe"), AttachmentStatus::Pending);
    assert_eq!(status(&f, "auditor"), AttachmentStatus::Pending);
}

#[test]
fn unknown_document_is_explicit() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture(dir.path(), 10);
    let err = f.scanner.trigger_document(Path::new("/nowhere.md")).unwrap_err();
    assert!(matches!(err, ScanError::UnknownDocument(_)));
}
