//! Identity resolution: local author name → remote user id.
//!
//! A pure read-through lookup against the platform; no cache is kept
//! within or across runs. The trait seam exists so the engine can be
//! driven against a mock in tests.
//!
//! # Errors
//!
//! - [`MirrorError::UserNotFound`](crate::error::MirrorError::UserNotFound)
//!   if the name has no remote account
//! - [`MirrorError::Transport`](crate::error::MirrorError::Transport) on
//!   network/5xx failures (retried by the client's policy)
//! - `Unauthorized`/`MalformedResponse` on broken responses (fatal)

use crate::store::BoxFuture;

/// Maps a local author name to the remote platform's user id.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Look up the remote uid for an author name.
    fn resolve<'a>(&'a self, username: &'a str) -> BoxFuture<'a, i64>;
}
