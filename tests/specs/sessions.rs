// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle specs.

use crate::prelude::*;

#[tokio::test]
async fn conversation_survives_a_restart() {
    let spec = Spec::new();
    spec.backend.push_reply("noted");
    spec.backend.push_reply("still here");

    let outcome =
        spec.orch.run_turn_blocking("scribe", "remember this", TurnOptions::default()).await;
    let token = completed(outcome.unwrap());

    // Restart: a fresh orchestrator over the same state directory.
    let orch = spec.reopen();
    let sessions = orch.list_sessions(false);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].token, token);
    assert_eq!(sessions[0].message_count, 2);

    let opts = TurnOptions::default().token(token.clone());
    let outcome = orch.run_turn_blocking("scribe", "and this", opts).await.unwrap();
    assert_eq!(completed(outcome), token);

    let session = orch.get_session(&token).unwrap();
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[3].content, "still here");
    // The backend was asked to resume, not to start over.
    assert_eq!(spec.backend.calls()[1].resume_token.as_ref(), Some(&token));
}

#[tokio::test]
async fn lost_backend_session_reports_recovery_options() {
    let spec = Spec::new();
    spec.backend.push_reply("kept");
    let outcome =
        spec.orch.run_turn_blocking("scribe", "start", TurnOptions::default()).await;
    let token = completed(outcome.unwrap());
    for i in 0..10 {
        spec.orch
            .sessions()
            .append_message(&token, Role::User, format!("note {i}"))
            .await
            .unwrap();
    }

    spec.backend.push_error(BackendError::SessionNotResumable(token.clone()));
    let opts = TurnOptions::default().token(token.clone());
    let outcome = spec.orch.run_turn_blocking("scribe", "more", opts).await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::SessionUnavailable { message_count: 12, has_local_history: true }
    );
    // Local history is intact for whichever recovery the caller picks.
    assert_eq!(spec.orch.get_session(&token).unwrap().messages.len(), 12);
}

#[tokio::test]
async fn archived_sessions_are_hidden_until_asked_for() {
    let spec = Spec::new();
    spec.backend.push_reply("one");
    spec.backend.push_reply("two");
    let first = completed(
        spec.orch.run_turn_blocking("scribe", "a", TurnOptions::default()).await.unwrap(),
    );
    let second = completed(
        spec.orch.run_turn_blocking("scribe", "b", TurnOptions::default()).await.unwrap(),
    );
    assert_ne!(first, second);

    spec.orch.archive_session(&first).await.unwrap();
    let visible = spec.orch.list_sessions(false);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].token, second);
    assert_eq!(spec.orch.list_sessions(true).len(), 2);

    spec.orch.unarchive_session(&first).await.unwrap();
    assert_eq!(spec.orch.list_sessions(false).len(), 2);
}

#[tokio::test]
async fn deleted_sessions_stay_gone_after_restart() {
    let spec = Spec::new();
    spec.backend.push_reply("ephemeral");
    let token = completed(
        spec.orch.run_turn_blocking("scribe", "hi", TurnOptions::default()).await.unwrap(),
    );

    spec.orch.delete_session(&token).await.unwrap();
    assert!(spec.orch.get_session(&token).is_err());

    let orch = spec.reopen();
    assert!(orch.list_sessions(true).is_empty());
}
