//! Configuration for the mirror engine.
//!
//! All configuration is passed to the components at construction and can be
//! built programmatically or deserialized from YAML/JSON. There is no
//! dynamic reconfiguration at runtime.
//!
//! # Quick Start
//!
//! ```rust
//! use thread_mirror::config::{MirrorConfig, ForumConfig, ThreadConfig};
//!
//! let config = MirrorConfig {
//!     forum: ForumConfig {
//!         base_url: "https://forum.example.com".into(),
//!         api_token: "secret".into(),
//!         ..ForumConfig::for_testing("https://forum.example.com")
//!     },
//!     thread: ThreadConfig {
//!         title: "agent session 42".into(),
//!         owner: "agent".into(),
//!     },
//!     ..MirrorConfig::for_testing("https://forum.example.com", "memory.db")
//! };
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! MirrorConfig
//! ├── forum: ForumConfig       # base URL, token, proxy, category
//! ├── log: LogConfig           # conversation log backend + path
//! ├── thread: ThreadConfig     # remote thread title + owning author
//! └── engine: EngineConfig     # poll interval, retry policy
//! ```

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The top-level config object for a mirror run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Remote platform connection settings.
    pub forum: ForumConfig,

    /// Conversation log backend settings.
    #[serde(default)]
    pub log: LogConfig,

    /// The remote thread to mirror into.
    pub thread: ThreadConfig,

    /// Engine pacing and retry settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MirrorConfig {
    /// Create a minimal config for testing.
    pub fn for_testing(base_url: &str, sqlite_path: &str) -> Self {
        Self {
            forum: ForumConfig::for_testing(base_url),
            log: LogConfig {
                backend: LogBackend::Sqlite,
                sqlite_path: sqlite_path.to_string(),
            },
            thread: ThreadConfig {
                title: "test thread".to_string(),
                owner: "alice".to_string(),
            },
            engine: EngineConfig::for_testing(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ForumConfig: remote platform connection
// ═══════════════════════════════════════════════════════════════════════════════

/// Connection settings for the remote discussion platform.
///
/// These are turned into one immutable HTTP client at construction;
/// there is no ambient/global client state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    /// Platform base URL, e.g. `"https://forum.example.com"`.
    pub base_url: String,

    /// Bearer token for the platform API.
    pub api_token: String,

    /// Optional HTTP(S) proxy between the engine and the platform.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Category the mirrored topic is created in.
    #[serde(default = "default_category_id")]
    pub category_id: i64,

    /// Uid the token acts as for read-side lookups.
    #[serde(default = "default_read_as_uid")]
    pub read_as_uid: i64,
}

fn default_category_id() -> i64 {
    7
}

fn default_read_as_uid() -> i64 {
    4
}

impl ForumConfig {
    /// Create a forum config for testing.
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_token: "test-token".to_string(),
            proxy: None,
            category_id: 7,
            read_as_uid: 4,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LogConfig: conversation log backend selection
// ═══════════════════════════════════════════════════════════════════════════════

/// Which conversation log backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    /// Discard everything (no record kept).
    #[default]
    None,
    /// Durable SQLite log.
    Sqlite,
}

/// Conversation log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Backend selection; the discarding backend is the default so that a
    /// run without storage configuration keeps no record.
    #[serde(default)]
    pub backend: LogBackend,

    /// SQLite file path (used by the `sqlite` backend).
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_sqlite_path() -> String {
    "ckpt/agent_memory/memory.db".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::None,
            sqlite_path: default_sqlite_path(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ThreadConfig: the remote thread
// ═══════════════════════════════════════════════════════════════════════════════

/// The remote thread the conversation is mirrored into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Topic title. Also the key under which the thread is resumed after
    /// a restart.
    pub title: String,

    /// Author name that owns the remote topic.
    pub owner: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EngineConfig: pacing and retry
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep between polls of the log, as a duration string (e.g. "5s").
    /// The only pacing mechanism; there is no push notification from the
    /// store.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Maximum attempts per remote call (including the first).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between retry attempts, as a duration string.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            retry_attempts: default_retry_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl EngineConfig {
    /// Fast pacing for tests.
    pub fn for_testing() -> Self {
        Self {
            poll_interval: "20ms".to_string(),
            retry_attempts: 3,
            retry_delay: "10ms".to_string(),
        }
    }

    /// Parse the poll interval string to a Duration.
    pub fn poll_interval_duration(&self) -> Duration {
        humantime::parse_duration(&self.poll_interval).unwrap_or(Duration::from_secs(5))
    }

    /// Build the retry policy for remote calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay =
            humantime::parse_duration(&self.retry_delay).unwrap_or(Duration::from_secs(5));
        RetryPolicy::fixed(self.retry_attempts, delay)
    }
}
