// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the mirror engine.
//!
//! This module defines the error types used throughout the mirror engine.
//! Errors are categorized by their source (remote platform, local store)
//! and include context to help with debugging.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Transport` | Yes | Network errors, timeouts, 5xx, rate limits |
//! | `UserNotFound` | No | Author has no remote account (data problem) |
//! | `Unauthorized` | No | Token rejected by the platform |
//! | `Api` | No | Unexpected platform response status |
//! | `MalformedResponse` | No | Platform response body could not be decoded |
//! | `Store` | No | Local SQLite errors (needs operator attention) |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine state machine violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`MirrorError::is_retryable()`] to determine if an operation should
//! be retried. Retryable errors indicate transient network or availability
//! issues; everything else is escalated immediately and stops the loop.

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Errors that can occur while mirroring a conversation.
///
/// Each variant includes context about where the error occurred.
/// Use [`is_retryable()`](Self::is_retryable) to check if the operation
/// should be retried.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Network-level or availability failure talking to the platform.
    ///
    /// Covers connect errors, timeouts, 5xx responses and rate limiting.
    /// Retryable with the configured retry policy.
    #[error("transport error ({operation}): {message}")]
    Transport {
        operation: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The author name has no account on the remote platform.
    ///
    /// Escalated immediately; a bad author name halts replication rather
    /// than silently dropping a message.
    #[error("no remote user for author {username:?}")]
    UserNotFound { username: String },

    /// The platform rejected the authentication token.
    ///
    /// Not retryable; fix the token and restart.
    #[error("unauthorized ({operation}): status {status}")]
    Unauthorized { operation: String, status: u16 },

    /// The platform answered with an unexpected status code.
    ///
    /// Not retryable; indicates a request the platform refuses.
    #[error("platform error ({operation}): status {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    /// The platform response body could not be decoded.
    ///
    /// Not retryable; the response is malformed at the source.
    #[error("malformed response ({operation}): {message}")]
    MalformedResponse { operation: String, message: String },

    /// SQLite error in the message store or the mirror ledger.
    ///
    /// Not retryable; indicates local database issues that need attention.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Invalid or missing configuration.
    ///
    /// Not retryable; fix the configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine state machine violation.
    ///
    /// Occurs when an operation is attempted in the wrong state
    /// (e.g. mirroring before a remote thread exists).
    /// Not retryable; indicates a bug in the caller.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    ///
    /// Catch-all for errors that shouldn't happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Create a transport error from a reqwest error.
    pub fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a transport error without a source.
    pub fn transport_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true, // Network errors are retryable
            Self::UserNotFound { .. } => false, // Data problem, not a network problem
            Self::Unauthorized { .. } => false,
            Self::Api { .. } => false,
            Self::MalformedResponse { .. } => false,
            Self::Store(_) => false, // Local DB issues need attention
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(e: reqwest::Error) -> Self {
        Self::transport("unknown", e)
    }
}
