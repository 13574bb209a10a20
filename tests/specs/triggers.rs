// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger scanner specs: scheduled cycles, manual activation, and
//! failure reporting on the attachment.

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn hourly_trigger_runs_once_per_hour() {
    let spec = Spec::new();
    let path = PathBuf::from("notes/daily.md");
    spec.orch.scanner().attach(&path, AgentAttachment::new("digest", Trigger::Hourly)).unwrap();
    spec.backend.push_reply("summarized");

    let pool = WorkerPool::start(Arc::clone(&spec.orch), &spec.config);
    settled(&spec.orch, 1).await;
    pool.shutdown().await;

    let doc = spec.orch.scanner().document(&path).unwrap();
    let attachment = doc.attachment("digest").unwrap();
    assert_eq!(attachment.status, AttachmentStatus::Completed);
    let first_run = attachment.last_run_ms.unwrap();

    // Half an hour later: nothing new to do.
    spec.clock.advance(Duration::from_secs(30 * 60));
    assert_eq!(spec.orch.scan_cycle().unwrap(), 0);

    // Past the hour: the attachment fires again.
    spec.clock.advance(Duration::from_secs(31 * 60));
    assert_eq!(spec.orch.scan_cycle().unwrap(), 1);
    let item = spec
        .orch
        .queue_state()
        .items
        .into_iter()
        .find(|item| item.status == ItemStatus::Pending)
        .unwrap();
    assert_eq!(item.agent, "digest");
    assert_eq!(item.context.get(CTX_DOCUMENT).map(String::as_str), Some("notes/daily.md"));
    assert!(first_run > 0);
}

#[tokio::test]
async fn manual_triggers_need_explicit_activation() {
    let spec = Spec::new();
    let path = PathBuf::from("notes/daily.md");
    spec.orch.scanner().attach(&path, AgentAttachment::new("digest", Trigger::Manual)).unwrap();

    // Scanning alone never fires a manual trigger.
    assert_eq!(spec.orch.scan_cycle().unwrap(), 0);

    assert_eq!(spec.orch.trigger_document(&path).unwrap(), 1);
    assert_eq!(spec.orch.scan_cycle().unwrap(), 1);
    assert_eq!(spec.orch.queue_state().pending, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_runs_surface_on_the_attachment() {
    let spec = Spec::new();
    let path = PathBuf::from("notes/daily.md");
    spec.orch.scanner().attach(&path, AgentAttachment::new("digest", Trigger::Hourly)).unwrap();
    spec.backend.push_error(BackendError::Other("summarizer crashed".to_string()));

    let pool = WorkerPool::start(Arc::clone(&spec.orch), &spec.config);
    settled(&spec.orch, 1).await;
    pool.shutdown().await;

    assert_eq!(spec.orch.queue_state().failed, 1);
    let doc = spec.orch.scanner().document(&path).unwrap();
    let attachment = doc.attachment("digest").unwrap();
    assert_eq!(attachment.status, AttachmentStatus::Error);
    assert_eq!(attachment.last_error.as_deref(), Some("summarizer crashed"));

    // A reset clears the error and re-arms the attachment.
    assert_eq!(spec.orch.reset_agents(&path).unwrap(), 1);
    let doc = spec.orch.scanner().document(&path).unwrap();
    assert_eq!(doc.attachment("digest").unwrap().status, AttachmentStatus::Pending);
}
