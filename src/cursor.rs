// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mirror ledger: replication cursor and entry↔post id mapping.
//!
//! The ledger lives in the same SQLite file as the conversation log and
//! records three things per remote thread:
//!
//! - the thread itself (`tid`, title, owner), so a restart resumes the
//!   same remote topic instead of creating a new one;
//! - the bidirectional mapping between local entry ids and remote post
//!   ids, so replies stay attached to the correct parent across restarts;
//! - the cursor: the highest entry id fully processed (posted or
//!   deliberately skipped).
//!
//! # Write Semantics
//!
//! Replication progress must survive restarts without reposting, so writes
//! are synchronous write-through: a successful post records its mapping
//! and advances the cursor in one transaction before the engine moves on.
//! A crash therefore never leaves a posted entry unrecorded past the
//! cursor.
//!
//! Reads are served from an in-memory cache loaded at open.
//!
//! # Cursor Semantics
//!
//! The cursor stores the **last fully processed** entry id. On restart the
//! engine resumes from `cursor + 1` (exclusive read). The cursor never
//! decreases; advancing to a non-greater id is a no-op.

use crate::error::{MirrorError, Result};
use crate::metrics;
use crate::store::SqliteStore;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct LedgerCache {
    /// tid -> last fully processed entry id
    cursors: HashMap<i64, i64>,
    /// (tid, entry_id) -> pid
    entry_to_pid: HashMap<(i64, i64), i64>,
    /// (tid, pid) -> entry_id
    pid_to_entry: HashMap<(i64, i64), i64>,
}

/// Persistent cursor and id-mapping storage, sharing the log's SQLite pool.
pub struct MirrorLedger {
    pool: SqlitePool,
    cache: RwLock<LedgerCache>,
}

impl MirrorLedger {
    /// Open the ledger over the log's database, creating tables as needed
    /// and loading existing state into the cache.
    pub async fn open(store: &SqliteStore) -> Result<Self> {
        let pool = store.pool().clone();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_threads (
                tid INTEGER PRIMARY KEY,
                title TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_posts (
                tid INTEGER NOT NULL,
                entry_id INTEGER NOT NULL,
                pid INTEGER NOT NULL,
                posted_at INTEGER NOT NULL,
                PRIMARY KEY (tid, entry_id),
                UNIQUE (tid, pid)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_cursors (
                tid INTEGER PRIMARY KEY,
                last_entry_id INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let mut cache = LedgerCache::default();

        let cursors: Vec<(i64, i64)> =
            sqlx::query_as("SELECT tid, last_entry_id FROM mirror_cursors")
                .fetch_all(&pool)
                .await?;
        for (tid, last_entry_id) in cursors {
            cache.cursors.insert(tid, last_entry_id);
        }

        let posts: Vec<(i64, i64, i64)> =
            sqlx::query_as("SELECT tid, entry_id, pid FROM mirror_posts")
                .fetch_all(&pool)
                .await?;
        for (tid, entry_id, pid) in posts {
            cache.entry_to_pid.insert((tid, entry_id), pid);
            cache.pid_to_entry.insert((tid, pid), entry_id);
        }

        if !cache.cursors.is_empty() {
            info!(
                threads = cache.cursors.len(),
                mappings = cache.entry_to_pid.len(),
                "Restored mirror ledger from previous run"
            );
        }

        Ok(Self {
            pool,
            cache: RwLock::new(cache),
        })
    }

    /// Look up a previously recorded thread by title.
    pub async fn find_thread(&self, title: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT tid FROM mirror_threads WHERE title = ?")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(tid,)| tid))
    }

    /// Record a newly created remote thread and initialize its cursor.
    pub async fn record_thread(&self, tid: i64, title: &str, owner: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO mirror_threads (tid, title, owner, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(tid)
        .bind(title)
        .bind(owner)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO mirror_cursors (tid, last_entry_id, updated_at) VALUES (?, 0, ?)",
        )
        .bind(tid)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.cache.write().await.cursors.insert(tid, 0);
        debug!(tid, title, "Recorded remote thread");
        Ok(())
    }

    /// The cursor for a thread; 0 if the thread has never advanced.
    pub async fn cursor(&self, tid: i64) -> i64 {
        self.cache.read().await.cursors.get(&tid).copied().unwrap_or(0)
    }

    /// Advance the cursor past an entry that produced no remote effect.
    ///
    /// Durable before return. Advancing to a non-greater id is a no-op.
    pub async fn advance(&self, tid: i64, entry_id: i64) -> Result<()> {
        {
            let cache = self.cache.read().await;
            if cache.cursors.get(&tid).copied().unwrap_or(0) >= entry_id {
                debug!(tid, entry_id, "Cursor already past entry");
                return Ok(());
            }
        }

        let result = self.persist_cursor(tid, entry_id).await;
        metrics::record_ledger_persist(result.is_ok());
        result?;

        self.cache.write().await.cursors.insert(tid, entry_id);
        Ok(())
    }

    /// Record a posted entry and advance the cursor, in one transaction.
    ///
    /// Enforces at-most-once: a second mapping for the same entry id or
    /// the same pid within a thread is an internal error.
    pub async fn record_post(&self, tid: i64, entry_id: i64, pid: i64) -> Result<()> {
        {
            let cache = self.cache.read().await;
            if cache.entry_to_pid.contains_key(&(tid, entry_id)) {
                return Err(MirrorError::Internal(format!(
                    "entry {} already mapped in thread {}",
                    entry_id, tid
                )));
            }
            if cache.pid_to_entry.contains_key(&(tid, pid)) {
                return Err(MirrorError::Internal(format!(
                    "pid {} already mapped in thread {}",
                    pid, tid
                )));
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        let result: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "INSERT INTO mirror_posts (tid, entry_id, pid, posted_at) VALUES (?, ?, ?, ?)",
            )
            .bind(tid)
            .bind(entry_id)
            .bind(pid)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                r#"
                INSERT INTO mirror_cursors (tid, last_entry_id, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(tid) DO UPDATE SET
                    last_entry_id = MAX(last_entry_id, excluded.last_entry_id),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(tid)
            .bind(entry_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        metrics::record_ledger_persist(result.is_ok());
        result?;

        let mut cache = self.cache.write().await;
        cache.entry_to_pid.insert((tid, entry_id), pid);
        cache.pid_to_entry.insert((tid, pid), entry_id);
        let cursor = cache.cursors.entry(tid).or_insert(0);
        if *cursor < entry_id {
            *cursor = entry_id;
        }

        debug!(tid, entry_id, pid, "Recorded mirrored entry");
        Ok(())
    }

    /// The remote post id for an entry, if it has been mirrored.
    pub async fn pid_for(&self, tid: i64, entry_id: i64) -> Option<i64> {
        self.cache.read().await.entry_to_pid.get(&(tid, entry_id)).copied()
    }

    /// The local entry id behind a remote post, if mapped.
    pub async fn entry_for(&self, tid: i64, pid: i64) -> Option<i64> {
        self.cache.read().await.pid_to_entry.get(&(tid, pid)).copied()
    }

    /// Whether an entry already has a remote post in this thread.
    pub async fn is_mirrored(&self, tid: i64, entry_id: i64) -> bool {
        self.cache.read().await.entry_to_pid.contains_key(&(tid, entry_id))
    }

    /// Number of mirrored entries recorded for a thread.
    pub async fn mapped_count(&self, tid: i64) -> usize {
        self.cache
            .read()
            .await
            .entry_to_pid
            .keys()
            .filter(|(t, _)| *t == tid)
            .count()
    }

    async fn persist_cursor(&self, tid: i64, entry_id: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO mirror_cursors (tid, last_entry_id, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(tid) DO UPDATE SET
                last_entry_id = MAX(last_entry_id, excluded.last_entry_id),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tid)
        .bind(entry_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
