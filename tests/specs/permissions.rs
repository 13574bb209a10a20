// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission flow specs: allow-lists, interactive approval, timeout,
//! and session-scoped capability grants.

use crate::prelude::*;
use serde_json::json;

async fn first_pending(orch: &Engine) -> warden_core::PermissionRequest {
    for _ in 0..500 {
        if let Some(request) = orch.pending_permissions().into_iter().next() {
            return request;
        }
        tokio::task::yield_now().await;
    }
    panic!("no permission request became pending");
}

async fn streamed_turn(
    spec: &Spec,
    agent: &str,
    message: &str,
) -> (TurnOutcome, Vec<BackendEvent>) {
    let (sink, mut events) = tokio::sync::mpsc::channel(16);
    let outcome = spec
        .orch
        .run_turn_streaming(agent, message, TurnOptions::default(), sink, CancellationToken::new())
        .await
        .unwrap();
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    (outcome, seen)
}

fn tool_results(events: &[BackendEvent]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            BackendEvent::ToolResult { content, is_error, .. } => {
                Some((content.clone(), *is_error))
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn reads_and_allowlisted_writes_pass_without_approval() {
    let spec = Spec::new();
    spec.backend.push_turn(
        FakeTurn::replying("done")
            .tool_use("read", json!({ "path": "/etc/hosts" }))
            .tool_use("write", json!({ "path": "notes/today.md" })),
    );

    let (outcome, events) = streamed_turn(&spec, "scribe", "update the notes").await;
    completed(outcome);
    assert!(spec.orch.pending_permissions().is_empty());
    assert_eq!(
        tool_results(&events),
        vec![("read: done".to_string(), false), ("write: done".to_string(), false)]
    );
}

#[tokio::test]
async fn writes_outside_the_allowlist_wait_for_a_decision() {
    let spec = Spec::new();
    spec.backend
        .push_turn(FakeTurn::replying("tried").tool_use("write", json!({ "path": "/etc/passwd" })));

    let (sink, mut events) = tokio::sync::mpsc::channel(16);
    let orch = Arc::clone(&spec.orch);
    let task = tokio::spawn(async move {
        orch.run_turn_streaming(
            "scribe",
            "overwrite it",
            TurnOptions::default(),
            sink,
            CancellationToken::new(),
        )
        .await
    });

    let request = first_pending(&spec.orch).await;
    assert_eq!(request.tool, "write");
    assert_eq!(request.agent, "scribe");
    assert!(spec.orch.deny_permission(&request.id));

    let outcome = task.await.unwrap().unwrap();
    completed(outcome);
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(tool_results(&seen), vec![("denied".to_string(), true)]);
}

#[tokio::test(start_paused = true)]
async fn unanswered_requests_deny_after_the_timeout() {
    let spec = Spec::new();
    spec.backend
        .push_turn(FakeTurn::replying("gave up").tool_use("write", json!({ "path": "/tmp/x" })));

    // Nobody answers; paused time runs the clock out.
    let (outcome, events) = streamed_turn(&spec, "scribe", "try anyway").await;
    completed(outcome);
    assert_eq!(tool_results(&events), vec![("denied: timeout".to_string(), true)]);
    assert!(spec.orch.pending_permissions().is_empty());
}

#[tokio::test]
async fn capability_grants_stick_for_the_session() {
    let spec = Spec::new();
    spec.backend.push_reply("hello");
    let token = completed(
        spec.orch.run_turn_blocking("scribe", "hi", TurnOptions::default()).await.unwrap(),
    );

    spec.backend
        .push_turn(FakeTurn::replying("queried").tool_use("database", json!({ "q": "select 1" })));
    let orch = Arc::clone(&spec.orch);
    let task = {
        let token = token.clone();
        tokio::spawn(async move {
            let opts = TurnOptions::default().token(token);
            orch.run_turn_blocking("scribe", "query the db", opts).await
        })
    };
    let request = first_pending(&spec.orch).await;
    assert_eq!(request.tool, "database");
    assert!(spec.orch.grant_permission(&request.id));
    completed(task.await.unwrap().unwrap());

    // Same session, same capability: no new request is filed.
    spec.backend
        .push_turn(FakeTurn::replying("queried again").tool_use("database", json!({ "q": "2" })));
    let opts = TurnOptions::default().token(token);
    let outcome = spec.orch.run_turn_blocking("scribe", "again", opts).await.unwrap();
    completed(outcome);
    assert!(spec.orch.pending_permissions().is_empty());
}
