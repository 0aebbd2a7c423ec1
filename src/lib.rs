//! # Thread Mirror
//!
//! Mirrors a locally recorded, threaded conversation log onto a remote
//! discussion platform, preserving reply structure, as new entries appear.
//!
//! ## Architecture
//!
//! The engine sits between the local conversation log and a NodeBB-style
//! forum, reconciling two identifier spaces (local entry ids, remote post
//! ids) while the log is still being written:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           thread-mirror                             │
//! │                                                                     │
//! │  ┌─────────────┐    ┌───────────────────┐    ┌──────────────────┐   │
//! │  │ SqliteStore │───►│ ReplicationEngine │───►│ ForumClient      │   │
//! │  │ (read_from) │    │ (poll ⇄ process)  │    │ (topics/replies) │   │
//! │  └─────────────┘    └───────────────────┘    └──────────────────┘   │
//! │         │                     │                                     │
//! │         │                     ▼                                     │
//! │         │           ┌──────────────────┐                            │
//! │         └──────────►│ MirrorLedger     │                            │
//! │        (same file)  │ (cursor + id map)│                            │
//! │                     └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! New entries are mirrored strictly in id order: non-participant roles
//! are skipped, authors resolve to remote users, parents resolve to
//! remote posts through the ledger, and every posted reply records its
//! mapping and advances the cursor in one transaction. A restart resumes
//! the recorded thread at the recorded cursor with zero reposts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thread_mirror::{ForumClient, MirrorConfig, ReplicationEngine, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> thread_mirror::Result<()> {
//!     let config = MirrorConfig::for_testing("https://forum.example.com", "memory.db");
//!
//!     let store = Arc::new(SqliteStore::new(&config.log.sqlite_path).await?);
//!     let client = Arc::new(ForumClient::new(&config.forum, config.engine.retry_policy())?);
//!
//!     let mut engine = ReplicationEngine::new(config, store, client).await?;
//!     engine.run().await // runs until shutdown or terminal error
//! }
//! ```

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod remote;
pub mod retry;
pub mod store;

// Re-exports for convenience
pub use config::{EngineConfig, ForumConfig, LogBackend, LogConfig, MirrorConfig, ThreadConfig};
pub use cursor::MirrorLedger;
pub use engine::{compose_post, EngineState, ReplicationEngine};
pub use error::{MirrorError, Result};
pub use identity::IdentityResolver;
pub use remote::{ForumClient, ThreadWriter};
pub use retry::RetryPolicy;
pub use store::{open_log, ConversationLog, Entry, NoOpLog, Role, SqliteStore, NO_PARENT};
