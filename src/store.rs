// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The append-only threaded conversation log.
//!
//! A conversation is recorded as a chain of parent-linked entries: each
//! recognized entry points at the previous recognized one, forming a tree
//! (in practice a single chain) rooted at entries with no parent.
//!
//! Two backends share the [`ConversationLog`] capability, selected by
//! configuration at construction via [`open_log`]:
//!
//! - [`NoOpLog`]: discards everything (standalone runs that keep no record)
//! - [`SqliteStore`]: durable log in SQLite, WAL mode
//!
//! The durable store additionally exposes the replication read side,
//! [`SqliteStore::read_from`], and shares its connection pool with the
//! mirror ledger so that mapping and cursor writes land in the same file.
//!
//! # Chaining Rules
//!
//! - A batch appends one entry per `(content, role)` pair, in call order,
//!   inside one transaction: no partial batch is ever visible.
//! - Entries whose role tag parses (`system`, `human`, `ai`) advance the
//!   parent chain; the chain threads across `append` calls as one
//!   continuous conversation.
//! - Entries with an unrecognized or empty role are committed (they stay
//!   visible in `read_from`) but do not advance the chain: the next
//!   recognized entry parents onto the last recognized one.
//! - `parent` always references an already-committed entry with a smaller
//!   id, or [`NO_PARENT`]. No forward references, no cycles.

use crate::config::{LogBackend, LogConfig};
use crate::error::{MirrorError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Sentinel parent value for entries that start a thread.
pub const NO_PARENT: i64 = -1;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Speaker role tag attached to each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Prompt scaffolding; recorded but never mirrored.
    System,
    /// A human participant.
    Human,
    /// The agent.
    Ai,
}

impl Role {
    /// Parse a role tag. Unrecognized or empty tags yield `None`.
    pub fn parse(tag: &str) -> Option<Role> {
        match tag {
            "system" => Some(Role::System),
            "human" => Some(Role::Human),
            "ai" => Some(Role::Ai),
            _ => None,
        }
    }

    /// The canonical tag string.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "human",
            Role::Ai => "ai",
        }
    }

    /// Whether entries with this role are projected onto the remote thread.
    pub fn is_mirrored(self) -> bool {
        !matches!(self, Role::System)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record in the conversation log. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Strictly increasing id assigned by the store on insert.
    pub id: i64,
    /// Milliseconds since epoch, assigned at insert time.
    pub timestamp: i64,
    /// Speaker name.
    pub author: String,
    /// Role tag as recorded; parse with [`Entry::role`].
    pub role: String,
    /// Label carried alongside content, prepended when posting.
    pub topic: String,
    /// Message body.
    pub content: String,
    /// Id of the parent entry, or [`NO_PARENT`].
    pub parent: i64,
}

impl Entry {
    /// Whether this entry replies to another entry.
    pub fn has_parent(&self) -> bool {
        self.parent != NO_PARENT
    }

    /// The parsed role, if the recorded tag is recognized.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// The capability shared by all log backends: durably record (or discard)
/// a batch of role-tagged messages.
///
/// Returns the assigned entry ids; discarding backends return an empty
/// vector.
pub trait ConversationLog: Send + Sync + 'static {
    fn append<'a>(
        &'a self,
        author: &'a str,
        topic: &'a str,
        messages: &'a [(String, String)],
    ) -> BoxFuture<'a, Vec<i64>>;
}

/// A discarding backend for runs that keep no record.
///
/// Logs what it would have stored but retains nothing.
#[derive(Clone)]
pub struct NoOpLog;

impl ConversationLog for NoOpLog {
    fn append<'a>(
        &'a self,
        author: &'a str,
        topic: &'a str,
        messages: &'a [(String, String)],
    ) -> BoxFuture<'a, Vec<i64>> {
        Box::pin(async move {
            debug!(
                author,
                topic,
                count = messages.len(),
                "NoOp: would record messages"
            );
            Ok(Vec::new())
        })
    }
}

/// Durable conversation log backed by SQLite.
///
/// One table, additive-only:
///
/// ```text
/// | timestamp: int | author: text | role: text | topic: text | content: text | parent: int | id: int pk |
/// ```
pub struct SqliteStore {
    pool: SqlitePool,
    /// Id of the last recognized-role entry; the next entry's parent.
    chain_tail: Mutex<i64>,
    path: String,
}

impl SqliteStore {
    /// Open (or create) the log at the given path.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        info!(path = %path_str, "Opening conversation log");

        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    MirrorError::Config(format!("cannot create log directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path_str))
            .map_err(|e| MirrorError::Config(format!("invalid SQLite path: {}", e)))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2) // Low concurrency needed
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory (
                timestamp INTEGER NOT NULL,
                author TEXT NOT NULL,
                role TEXT NOT NULL,
                topic TEXT NOT NULL,
                content TEXT NOT NULL,
                parent INTEGER NOT NULL DEFAULT -1,
                id INTEGER PRIMARY KEY AUTOINCREMENT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        // Resume the parent chain from the last recognized entry on disk.
        let tail: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM memory WHERE role IN ('system', 'human', 'ai') \
             ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&pool)
        .await?;

        let tail = tail.map(|(id,)| id).unwrap_or(NO_PARENT);
        if tail != NO_PARENT {
            debug!(chain_tail = tail, "Resumed parent chain from disk");
        }

        Ok(Self {
            pool,
            chain_tail: Mutex::new(tail),
            path: path_str,
        })
    }

    /// Append one entry per `(content, role)` pair, chained in call order.
    ///
    /// The whole batch commits in one transaction; the returned ids are in
    /// insertion order. Unrecognized-role entries are committed but do not
    /// advance the chain.
    pub async fn append(
        &self,
        author: &str,
        topic: &str,
        messages: &[(String, String)],
    ) -> Result<Vec<i64>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let mut chain = self.chain_tail.lock().await;
        let mut tail = *chain;

        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(messages.len());

        for (content, role) in messages {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let result = sqlx::query(
                r#"
                INSERT INTO memory (timestamp, author, role, topic, content, parent)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(timestamp)
            .bind(author)
            .bind(role)
            .bind(topic)
            .bind(content)
            .bind(tail)
            .execute(&mut *tx)
            .await?;

            let id = result.last_insert_rowid();
            if Role::parse(role).is_some() {
                tail = id;
            } else {
                debug!(id, role, "recorded entry with unrecognized role outside the chain");
            }
            ids.push(id);
        }

        tx.commit().await?;
        *chain = tail;

        debug!(author, count = ids.len(), "Appended entries");
        Ok(ids)
    }

    /// Entries with `id > min_id`, strictly ascending by id.
    ///
    /// Finite at call time; a repeated poll with an advanced `min_id` sees
    /// exactly the tail committed since the previous call returned.
    pub async fn read_from(&self, min_id: i64) -> Result<Vec<Entry>> {
        let rows: Vec<(i64, i64, String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, timestamp, author, role, topic, content, parent \
             FROM memory WHERE id > ? ORDER BY id ASC",
        )
        .bind(min_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, timestamp, author, role, topic, content, parent)| Entry {
                    id,
                    timestamp,
                    author,
                    role,
                    topic,
                    content,
                    parent,
                },
            )
            .collect())
    }

    /// The shared connection pool (used by the mirror ledger).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Conversation log closed");
    }
}

impl ConversationLog for SqliteStore {
    fn append<'a>(
        &'a self,
        author: &'a str,
        topic: &'a str,
        messages: &'a [(String, String)],
    ) -> BoxFuture<'a, Vec<i64>> {
        Box::pin(async move { SqliteStore::append(self, author, topic, messages).await })
    }
}

/// Construct the log backend selected by configuration.
pub async fn open_log(config: &LogConfig) -> Result<Arc<dyn ConversationLog>> {
    match config.backend {
        LogBackend::None => Ok(Arc::new(NoOpLog)),
        LogBackend::Sqlite => Ok(Arc::new(SqliteStore::new(&config.sqlite_path).await?)),
    }
}
