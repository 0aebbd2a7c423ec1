// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration tests for the mirror engine.
//!
//! The remote seam is driven by an in-process recording mock, so these
//! tests run without a live platform.
//!
//! # Test Organization
//! - `mirror_*` - end-to-end mirroring of log entries
//! - `skip_*` - entries processed without a remote effect
//! - `failure_*` - retry exhaustion and data-problem halts
//! - `restart_*` - resume and replay behavior across engine lifetimes

mod common;

use common::MockForum;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use thread_mirror::config::MirrorConfig;
use thread_mirror::engine::{EngineState, ReplicationEngine};
use thread_mirror::error::MirrorError;
use thread_mirror::store::{SqliteStore, NO_PARENT};

fn msg(content: &str, role: &str) -> (String, String) {
    (content.to_string(), role.to_string())
}

async fn open_store(path: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(path).await.unwrap())
}

/// Forum with the default cast of users registered.
async fn forum() -> Arc<MockForum> {
    let forum = Arc::new(MockForum::new());
    forum.add_user("alice", 1).await;
    forum.add_user("bot", 2).await;
    forum
}

async fn engine_for(
    store: Arc<SqliteStore>,
    forum: Arc<MockForum>,
    db_path: &Path,
    title: &str,
) -> ReplicationEngine<MockForum> {
    let mut config =
        MirrorConfig::for_testing("https://forum.example.com", &db_path.to_string_lossy());
    config.thread.title = title.to_string();
    ReplicationEngine::new(config, store, forum).await.unwrap()
}

// =============================================================================
// Mirroring
// =============================================================================

#[tokio::test]
async fn mirror_basic_chain() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("alice", "T", &[msg("hi", "human")]).await.unwrap();
    store.append("bot", "T", &[msg("hello", "ai")]).await.unwrap();

    // The store yields id=1 (parent=-1), id=2 (parent=1).
    let entries = store.read_from(0).await.unwrap();
    assert_eq!(entries[0].id, 1);
    assert_eq!(entries[0].parent, NO_PARENT);
    assert_eq!(entries[1].id, 2);
    assert_eq!(entries[1].parent, 1);

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    let processed = engine.mirror_available().await.unwrap();
    assert_eq!(processed, 2);

    let topics = forum.topics().await;
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].title, "session");
    assert_eq!(topics[0].category, 7);
    assert_eq!(topics[0].content, "");
    assert_eq!(topics[0].as_uid, 1); // owned by alice
    assert_eq!(topics[0].tid, engine.tid().unwrap());

    let replies = forum.replies().await;
    assert_eq!(replies.len(), 2);

    // id=1 posts top-level, id=2 replies to the post created for id=1.
    assert_eq!(replies[0].in_reply_to, None);
    assert_eq!(replies[0].as_uid, 1);
    assert_eq!(replies[0].content, "T\nhi");
    assert_eq!(replies[1].in_reply_to, Some(replies[0].pid));
    assert_eq!(replies[1].as_uid, 2);
    assert_eq!(replies[1].content, "T\nhello");

    // Replies land after the root post, never reuse its pid.
    assert!(replies[0].pid > topics[0].pid);

    assert_eq!(engine.cursor(), 2);
    assert_eq!(engine.state(), EngineState::Polling);

    // The resolver is a pure read-through: owner + one lookup per entry.
    assert_eq!(forum.resolve_count(), 3);
}

#[tokio::test]
async fn mirror_picks_up_entries_appended_between_polls() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("alice", "T", &[msg("hi", "human")]).await.unwrap();

    let mut engine = engine_for(store.clone(), forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    assert_eq!(engine.mirror_available().await.unwrap(), 1);

    // New tail committed after the first poll returned.
    store.append("bot", "T", &[msg("hello", "ai")]).await.unwrap();
    assert_eq!(engine.mirror_available().await.unwrap(), 1);

    let replies = forum.replies().await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].in_reply_to, Some(replies[0].pid));
}

// =============================================================================
// Skips
// =============================================================================

#[tokio::test]
async fn skip_system_entries_never_posted() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store
        .append(
            "alice",
            "T",
            &[msg("setup", "system"), msg("hi", "human"), msg("hello", "ai")],
        )
        .await
        .unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    assert_eq!(engine.mirror_available().await.unwrap(), 3);

    let replies = forum.replies().await;
    assert_eq!(replies.len(), 2, "system entry produced no remote call");

    // The system entry (id=1) is never mapped, so its child degrades to a
    // top-level reply; the grandchild still threads onto the child.
    let tid = engine.tid().unwrap();
    assert_eq!(engine.ledger().pid_for(tid, 1).await, None);
    assert_eq!(replies[0].in_reply_to, None);
    assert_eq!(replies[1].in_reply_to, Some(replies[0].pid));

    // The skip still advanced the cursor past the system entry.
    assert_eq!(engine.cursor(), 3);
    assert_eq!(engine.ledger().cursor(tid).await, 3);
}

#[tokio::test]
async fn skip_unrecognized_role_retained_in_log_only() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store
        .append("alice", "T", &[msg("noise", ""), msg("hi", "human")])
        .await
        .unwrap();

    // Both entries are recorded and visible.
    let entries = store.read_from(0).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, "");

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    assert_eq!(engine.mirror_available().await.unwrap(), 2);

    // Only the recognized entry reached the platform, as a top-level reply.
    let replies = forum.replies().await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].in_reply_to, None);
    assert_eq!(replies[0].content, "T\nhi");

    let tid = engine.tid().unwrap();
    assert_eq!(engine.ledger().mapped_count(tid).await, 1);
    assert_eq!(engine.cursor(), 2);
}

#[tokio::test]
async fn skip_already_mirrored_entries() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store
        .append("alice", "T", &[msg("hi", "human"), msg("hello", "ai")])
        .await
        .unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    assert_eq!(engine.mirror_available().await.unwrap(), 2);

    // A second pass sees nothing new and posts nothing.
    assert_eq!(engine.mirror_available().await.unwrap(), 0);
    assert_eq!(forum.reply_count().await, 2);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn failure_transient_exhaustion_halts_without_advancing() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("alice", "T", &[msg("hi", "human")]).await.unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();
    let tid = engine.tid().unwrap();

    // The engine's policy allows 3 attempts; fail all of them.
    forum.fail_next_replies(3);
    let err = engine.mirror_available().await.unwrap_err();
    assert!(err.is_retryable(), "terminal error carries the transient cause");
    assert_eq!(forum.reply_count().await, 0);

    // The cursor did not advance past the failed entry.
    assert_eq!(engine.cursor(), 0);
    assert_eq!(engine.ledger().cursor(tid).await, 0);

    // Once the platform recovers, the same entry mirrors exactly once.
    assert_eq!(engine.mirror_available().await.unwrap(), 1);
    assert_eq!(forum.reply_count().await, 1);
}

#[tokio::test]
async fn failure_transient_blip_recovers_within_policy() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("alice", "T", &[msg("hi", "human")]).await.unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();

    // Two failures, then success on the third attempt.
    forum.fail_next_replies(2);
    assert_eq!(engine.mirror_available().await.unwrap(), 1);
    assert_eq!(forum.reply_count().await, 1);
    assert_eq!(engine.cursor(), 1);
}

#[tokio::test]
async fn failure_unknown_author_halts() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("ghost", "T", &[msg("boo", "human")]).await.unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    engine.start_thread().await.unwrap();

    let err = engine.mirror_available().await.unwrap_err();
    assert!(matches!(err, MirrorError::UserNotFound { .. }));
    assert_eq!(forum.reply_count().await, 0);
    assert_eq!(engine.cursor(), 0);
}

// =============================================================================
// Restarts
// =============================================================================

#[tokio::test]
async fn restart_resumes_thread_without_reposting() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let forum = forum().await;

    let (tid, first_pids) = {
        let store = open_store(&db).await;
        store
            .append("alice", "T", &[msg("hi", "human"), msg("hello", "ai")])
            .await
            .unwrap();

        let mut engine = engine_for(store.clone(), forum.clone(), &db, "session").await;
        engine.start_thread().await.unwrap();
        engine.mirror_available().await.unwrap();

        let replies = forum.replies().await;
        let pids: Vec<i64> = replies.iter().map(|r| r.pid).collect();
        let tid = engine.tid().unwrap();
        drop(engine);
        store.close().await;
        (tid, pids)
    };

    // New process: same log, same title. The tail grew while we were down.
    let store = open_store(&db).await;
    store.append("alice", "T", &[msg("more", "human")]).await.unwrap();

    let mut engine = engine_for(store, forum.clone(), &db, "session").await;
    let resumed_tid = engine.start_thread().await.unwrap();
    assert_eq!(resumed_tid, tid, "resumed the recorded thread");
    assert_eq!(forum.topics().await.len(), 1, "no second create_topic");
    assert_eq!(engine.cursor(), 2, "cursor restored from the ledger");

    assert_eq!(engine.mirror_available().await.unwrap(), 1);
    let replies = forum.replies().await;
    assert_eq!(replies.len(), 3, "only the new entry was posted");

    // The new entry threads onto the pid recorded before the restart.
    assert_eq!(replies[2].in_reply_to, Some(first_pids[1]));
}

#[tokio::test]
async fn restart_with_fresh_ledger_context_reposts_everything() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store
        .append("alice", "T", &[msg("hi", "human"), msg("hello", "ai")])
        .await
        .unwrap();

    let mut first = engine_for(store.clone(), forum.clone(), &db, "thread A").await;
    first.start_thread().await.unwrap();
    first.mirror_available().await.unwrap();
    assert_eq!(forum.reply_count().await, 2);

    // A run with no ledger context for its thread replays from the origin:
    // the documented duplicate-post exposure.
    let mut second = engine_for(store, forum.clone(), &db, "thread B").await;
    let tid_b = second.start_thread().await.unwrap();
    assert_ne!(tid_b, first.tid().unwrap());
    assert_eq!(second.cursor(), 0, "fresh context re-traverses from the origin");

    assert_eq!(second.mirror_available().await.unwrap(), 2);
    assert_eq!(forum.reply_count().await, 4, "every entry posted twice");

    // Within the replay the mapping rebuilds, so reply structure is intact
    // in the second thread too.
    let replies = forum.replies().await;
    assert_eq!(replies[2].tid, tid_b);
    assert_eq!(replies[2].in_reply_to, None);
    assert_eq!(replies[3].in_reply_to, Some(replies[2].pid));
}

// =============================================================================
// Run loop
// =============================================================================

#[tokio::test]
async fn run_loop_mirrors_new_entries_until_shutdown() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("log.db");
    let store = open_store(&db).await;
    let forum = forum().await;

    store.append("alice", "T", &[msg("hi", "human")]).await.unwrap();

    let mut engine = engine_for(store.clone(), forum.clone(), &db, "session").await;
    let shutdown = engine.shutdown_handle();
    let task = tokio::spawn(async move {
        let result = engine.run().await;
        (result, engine)
    });

    wait_for_replies(&forum, 1).await;

    // The log keeps growing while the loop runs.
    store.append("bot", "T", &[msg("hello", "ai")]).await.unwrap();
    wait_for_replies(&forum, 2).await;

    shutdown.send(true).unwrap();
    let (result, engine) = task.await.unwrap();
    result.unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);

    let replies = forum.replies().await;
    assert_eq!(replies[1].in_reply_to, Some(replies[0].pid));
}

async fn wait_for_replies(forum: &MockForum, count: usize) {
    for _ in 0..200 {
        if forum.reply_count().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {} replies", count);
}
