// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue specs: ordering, restart recovery, depth limits.

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn queued_work_runs_in_priority_order_after_a_restart() {
    let spec = Spec::new();
    spec.orch
        .enqueue("courier", "low job", EnqueueOptions::default().priority(Priority::Low))
        .unwrap();
    spec.orch.enqueue("courier", "normal job", EnqueueOptions::default()).unwrap();
    spec.orch
        .enqueue("courier", "high job", EnqueueOptions::default().priority(Priority::High))
        .unwrap();

    // Restart before anything ran.
    let orch = spec.reopen();
    assert_eq!(orch.queue_state().pending, 3);

    let pool = WorkerPool::start(Arc::clone(&orch), &spec.config);
    settled(&orch, 3).await;
    pool.shutdown().await;

    let messages: Vec<String> =
        spec.backend.calls().into_iter().map(|call| call.message).collect();
    assert_eq!(messages, vec!["high job", "normal job", "low job"]);
    assert_eq!(orch.queue_state().completed, 3);
}

#[tokio::test(start_paused = true)]
async fn spawn_chains_stop_at_the_depth_limit() {
    let spec = Spec::new();
    // Every turn asks to spawn another scribe run; the per-item depth
    // budget ends the chain.
    spec.backend.push_reply(SPAWN_SCRIBE);
    spec.backend.push_reply(SPAWN_SCRIBE);
    spec.backend.push_reply(SPAWN_SCRIBE);

    let outcome = spec
        .orch
        .run_turn_blocking("scribe", "start the chain", TurnOptions::default())
        .await
        .unwrap();
    completed(outcome);

    let pool = WorkerPool::start(Arc::clone(&spec.orch), &spec.config);
    settled(&spec.orch, 2).await;
    pool.shutdown().await;

    // Depth 1 and 2 ran; the item they would have spawned at depth 3
    // was dropped, not enqueued.
    let state = spec.orch.queue_state();
    assert_eq!(state.completed, 2);
    assert_eq!(state.pending, 0);
    assert_eq!(spec.backend.calls().len(), 3);
    let depths: Vec<u8> = state.items.iter().map(|item| item.depth).collect();
    assert_eq!(depths, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn scheduled_items_wait_for_their_time() {
    let spec = Spec::new();
    spec.orch
        .enqueue(
            "courier",
            "later job",
            EnqueueOptions::default().scheduled_for_ms(EPOCH + 60_000),
        )
        .unwrap();

    let pool = WorkerPool::start(Arc::clone(&spec.orch), &spec.config);
    // Plenty of poll cycles pass without the wall clock moving.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(spec.orch.queue_state().pending, 1);

    spec.clock.advance(Duration::from_secs(61));
    settled(&spec.orch, 1).await;
    pool.shutdown().await;
    assert_eq!(spec.orch.queue_state().completed, 1);
}
