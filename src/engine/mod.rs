// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The mirror engine coordinator.
//!
//! Ties together the conversation log, the mirror ledger, and the remote
//! platform client into one sequential loop:
//!
//! 1. Create (or resume) the remote thread.
//! 2. Poll the log for entries past the cursor.
//! 3. Mirror each new entry in id order: skip non-participant roles,
//!    resolve the author, resolve the parent's remote post, reply, record
//!    the mapping and advance the cursor durably.
//! 4. Sleep the fixed poll interval and repeat.
//!
//! # Ordering
//!
//! Entries are mirrored strictly in ascending id order, so a reply is
//! never posted before its parent: a parent always has a smaller id, and
//! the loop is strictly sequential.
//!
//! # Failure Model
//!
//! Escalation policy is stop-the-loop. Transient failures are retried
//! inside the client; exhaustion, an unknown author, or any fatal platform
//! error halts mirroring with the cursor still pointing before the failed
//! entry. There is no skip-and-continue and no dead-letter path.
//!
//! # Concurrency
//!
//! One logical thread of control. The ledger and cursor are mutated only
//! by this loop; deployments running several engines over one log must
//! target disjoint remote threads.

mod types;

pub use types::EngineState;

use crate::config::MirrorConfig;
use crate::cursor::MirrorLedger;
use crate::error::{MirrorError, Result};
use crate::identity::IdentityResolver;
use crate::metrics;
use crate::remote::ThreadWriter;
use crate::store::{Entry, Role, SqliteStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Compose the body of a remote post from an entry's topic and content.
pub fn compose_post(topic: &str, content: &str) -> String {
    format!("{}\n{}", topic, content)
}

/// The mirror engine.
///
/// Generic over the remote seam so tests can drive it against a recording
/// mock instead of a live platform.
pub struct ReplicationEngine<C: IdentityResolver + ThreadWriter> {
    config: MirrorConfig,
    store: Arc<SqliteStore>,
    ledger: MirrorLedger,
    client: Arc<C>,

    /// Engine state (broadcast to watchers).
    state_tx: watch::Sender<EngineState>,

    /// Shutdown signal.
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    /// The remote thread all replies land in, once created/resumed.
    tid: Option<i64>,

    /// Highest entry id fully processed this run.
    cursor: i64,
}

impl<C: IdentityResolver + ThreadWriter> ReplicationEngine<C> {
    /// Create an engine over an open log and a remote client.
    ///
    /// Opens the mirror ledger in the log's database; a previously
    /// recorded thread with the configured title will be resumed when the
    /// engine starts.
    pub async fn new(
        config: MirrorConfig,
        store: Arc<SqliteStore>,
        client: Arc<C>,
    ) -> Result<Self> {
        let ledger = MirrorLedger::open(&store).await?;
        let (state_tx, _) = watch::channel(EngineState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            store,
            ledger,
            client,
            state_tx,
            shutdown_tx,
            shutdown_rx,
            tid: None,
            cursor: 0,
        })
    }

    /// Current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state_tx.subscribe()
    }

    /// A handle that stops the run loop when sent `true`.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// The remote thread id, once created or resumed.
    pub fn tid(&self) -> Option<i64> {
        self.tid
    }

    /// Highest entry id fully processed this run.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// The mirror ledger (mapping and cursor state).
    pub fn ledger(&self) -> &MirrorLedger {
        &self.ledger
    }

    fn set_state(&self, state: EngineState) {
        metrics::record_engine_state(&state.to_string());
        self.state_tx.send_replace(state);
    }

    /// Create the remote thread, or resume the one recorded for this title.
    ///
    /// Returns the thread id. Fatal errors here abort the run: there is no
    /// thread to mirror into.
    pub async fn start_thread(&mut self) -> Result<i64> {
        if let Some(tid) = self.tid {
            return Err(MirrorError::InvalidState {
                expected: EngineState::Created.to_string(),
                actual: format!("thread {} already active", tid),
            });
        }

        self.set_state(EngineState::CreatingThread);

        let title = self.config.thread.title.clone();
        let owner = self.config.thread.owner.clone();

        if let Some(tid) = self.ledger.find_thread(&title).await? {
            self.cursor = self.ledger.cursor(tid).await;
            self.tid = Some(tid);
            info!(tid, cursor = self.cursor, title = %title, "Resuming previously mirrored thread");
            self.set_state(EngineState::Polling);
            return Ok(tid);
        }

        let owner_uid = self.client.resolve(&owner).await?;
        let (tid, root_pid) = self
            .client
            .create_topic(self.config.forum.category_id, &title, "", owner_uid)
            .await?;
        self.ledger.record_thread(tid, &title, &owner).await?;
        metrics::record_topic_created();
        info!(tid, root_pid, title = %title, owner = %owner, "Created remote thread");

        self.tid = Some(tid);
        self.cursor = 0;
        self.set_state(EngineState::Polling);
        Ok(tid)
    }

    /// Mirror every entry currently visible past the cursor.
    ///
    /// Returns how many entries were processed (posted or skipped). An
    /// error leaves the cursor before the failing entry.
    pub async fn mirror_available(&mut self) -> Result<usize> {
        let tid = self.tid.ok_or_else(|| MirrorError::InvalidState {
            expected: EngineState::Polling.to_string(),
            actual: self.state().to_string(),
        })?;

        let entries = self.store.read_from(self.cursor).await?;
        metrics::record_poll(entries.len());
        if entries.is_empty() {
            return Ok(0);
        }

        self.set_state(EngineState::Processing);
        debug!(count = entries.len(), cursor = self.cursor, "Processing new entries");

        for entry in &entries {
            self.process_entry(tid, entry).await?;
        }

        self.set_state(EngineState::Polling);
        Ok(entries.len())
    }

    /// Process a single entry: skip, or resolve + post + record.
    async fn process_entry(&mut self, tid: i64, entry: &Entry) -> Result<()> {
        match entry.role() {
            Some(Role::System) => {
                debug!(entry_id = entry.id, "System entry retained locally only");
                metrics::record_entry_skipped("system");
                self.ledger.advance(tid, entry.id).await?;
                self.cursor = entry.id;
                Ok(())
            }
            None => {
                debug!(entry_id = entry.id, role = %entry.role, "Unrecognized role, not mirrored");
                metrics::record_entry_skipped("unrecognized_role");
                self.ledger.advance(tid, entry.id).await?;
                self.cursor = entry.id;
                Ok(())
            }
            Some(role) => {
                if self.ledger.is_mirrored(tid, entry.id).await {
                    debug!(entry_id = entry.id, "Entry already mirrored, skipping");
                    metrics::record_entry_skipped("already_mirrored");
                    self.ledger.advance(tid, entry.id).await?;
                    self.cursor = entry.id;
                    return Ok(());
                }

                let uid = self.client.resolve(&entry.author).await?;

                let in_reply_to = if !entry.has_parent() {
                    None
                } else {
                    match self.ledger.pid_for(tid, entry.parent).await {
                        Some(pid) => Some(pid),
                        None => {
                            // Parent was skipped or never mapped; degrade to a
                            // top-level reply rather than dropping the entry.
                            debug!(
                                entry_id = entry.id,
                                parent = entry.parent,
                                "Parent has no remote post, replying top-level"
                            );
                            metrics::record_orphaned_reply();
                            None
                        }
                    }
                };

                let content = compose_post(&entry.topic, &entry.content);
                let pid = self.client.reply(tid, &content, uid, in_reply_to).await?;

                self.ledger.record_post(tid, entry.id, pid).await?;
                self.cursor = entry.id;
                metrics::record_entry_mirrored(role.as_str());
                info!(
                    entry_id = entry.id,
                    pid,
                    author = %entry.author,
                    role = %role,
                    "Mirrored entry"
                );
                Ok(())
            }
        }
    }

    /// Run the mirror loop until shutdown or a terminal error.
    ///
    /// Creates/resumes the remote thread first, then alternates between
    /// mirroring what is visible and sleeping the fixed poll interval.
    pub async fn run(&mut self) -> Result<()> {
        if self.tid.is_none() {
            if let Err(e) = self.start_thread().await {
                error!(error = %e, "Failed to create remote thread");
                self.set_state(EngineState::Failed);
                return Err(e);
            }
        }

        let interval = self.config.engine.poll_interval_duration();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.mirror_available().await {
                Ok(0) => debug!(cursor = self.cursor, "No new entries"),
                Ok(count) => debug!(count, cursor = self.cursor, "Mirrored batch"),
                Err(e) => {
                    error!(error = %e, cursor = self.cursor, "Mirroring stopped");
                    self.set_state(EngineState::Failed);
                    return Err(e);
                }
            }

            // The fixed inter-batch delay is the only pacing mechanism;
            // shutdown cuts the sleep short.
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(cursor = self.cursor, "Shutdown signal received, mirror loop stopped");
        self.set_state(EngineState::Stopped);
        Ok(())
    }
}
