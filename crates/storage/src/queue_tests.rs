// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::QueueStore;
use warden_core::{ItemStatus, QueueItem};

#[test]
fn load_without_snapshot_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = QueueStore::new(dir.path());
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = QueueStore::new(dir.path());

    let items = vec![
        QueueItem::builder().agent("scribe").build(),
        QueueItem::builder().agent("auditor").status(ItemStatus::Completed).build(),
    ];
    store.save(&items).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].agent, "scribe");
    assert_eq!(loaded[1].status, ItemStatus::Completed);
}

#[test]
fn load_resets_running_items_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = QueueStore::new(dir.path());

    let items = vec![
        QueueItem::builder().agent("scribe").status(ItemStatus::Running).started_at_ms(5_000u64).build(),
        QueueItem::builder().agent("auditor").status(ItemStatus::Failed).build(),
    ];
    store.save(&items).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded[0].status, ItemStatus::Pending);
    assert_eq!(loaded[0].started_at_ms, None);
    // Terminal items are untouched.
    assert_eq!(loaded[1].status, ItemStatus::Failed);
}

#[test]
fn save_rotates_previous_snapshot_to_bak() {
    let dir = tempfile::tempdir().unwrap();
    let store = QueueStore::new(dir.path());

    store.save(&[QueueItem::builder().agent("first").build()]).unwrap();
    store.save(&[QueueItem::builder().agent("second").build()]).unwrap();

    let bak = dir.path().join("queue.bak");
    assert!(bak.exists());
    let backed_up: Vec<QueueItem> =
        serde_json::from_str(&std::fs::read_to_string(&bak).unwrap()).unwrap();
    assert_eq!(backed_up[0].agent, "first");
    assert_eq!(store.load().unwrap()[0].agent, "second");
}
