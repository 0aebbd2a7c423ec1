//! Mock remote forum for testing.
//!
//! Records all calls to `create_topic()`, `reply()` and `resolve()` for
//! assertions. Reply failures can be scripted to test retry and
//! cursor-halt behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use thread_mirror::error::MirrorError;
use thread_mirror::identity::IdentityResolver;
use thread_mirror::remote::ThreadWriter;
use thread_mirror::store::BoxFuture;
use tokio::sync::RwLock;

/// A recorded create_topic() call, with the ids it returned.
#[derive(Debug, Clone)]
pub struct TopicCall {
    pub category: i64,
    pub title: String,
    pub content: String,
    pub as_uid: i64,
    pub tid: i64,
    pub pid: i64,
}

/// A recorded reply() call, with the pid it returned.
#[derive(Debug, Clone)]
pub struct ReplyCall {
    pub tid: i64,
    pub content: String,
    pub as_uid: i64,
    pub in_reply_to: Option<i64>,
    pub pid: i64,
}

/// Mock implementation of the remote seam that records all calls.
///
/// Ids are handed out from monotonic counters, so tests can assert the
/// exact thread structure the engine produced.
pub struct MockForum {
    users: RwLock<HashMap<String, i64>>,
    topics: RwLock<Vec<TopicCall>>,
    replies: RwLock<Vec<ReplyCall>>,
    next_tid: AtomicI64,
    next_pid: AtomicI64,
    /// Number of upcoming reply() calls that fail with a transient error.
    fail_replies: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockForum {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            topics: RwLock::new(Vec::new()),
            replies: RwLock::new(Vec::new()),
            next_tid: AtomicI64::new(100),
            next_pid: AtomicI64::new(1000),
            fail_replies: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    /// Register a remote account for an author name.
    pub async fn add_user(&self, name: &str, uid: i64) {
        self.users.write().await.insert(name.to_string(), uid);
    }

    /// Make the next `n` reply() calls fail with a transient error.
    pub fn fail_next_replies(&self, n: usize) {
        self.fail_replies.store(n, Ordering::SeqCst);
    }

    pub async fn topics(&self) -> Vec<TopicCall> {
        self.topics.read().await.clone()
    }

    pub async fn replies(&self) -> Vec<ReplyCall> {
        self.replies.read().await.clone()
    }

    pub async fn reply_count(&self) -> usize {
        self.replies.read().await.len()
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockForum {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver for MockForum {
    fn resolve<'a>(&'a self, username: &'a str) -> BoxFuture<'a, i64> {
        Box::pin(async move {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            self.users
                .read()
                .await
                .get(username)
                .copied()
                .ok_or_else(|| MirrorError::UserNotFound {
                    username: username.to_string(),
                })
        })
    }
}

impl ThreadWriter for MockForum {
    fn create_topic<'a>(
        &'a self,
        category: i64,
        title: &'a str,
        content: &'a str,
        as_uid: i64,
    ) -> BoxFuture<'a, (i64, i64)> {
        Box::pin(async move {
            let tid = self.next_tid.fetch_add(1, Ordering::SeqCst);
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.topics.write().await.push(TopicCall {
                category,
                title: title.to_string(),
                content: content.to_string(),
                as_uid,
                tid,
                pid,
            });
            Ok((tid, pid))
        })
    }

    fn reply<'a>(
        &'a self,
        tid: i64,
        content: &'a str,
        as_uid: i64,
        in_reply_to: Option<i64>,
    ) -> BoxFuture<'a, i64> {
        Box::pin(async move {
            if self.fail_replies.load(Ordering::SeqCst) > 0 {
                self.fail_replies.fetch_sub(1, Ordering::SeqCst);
                return Err(MirrorError::transport_msg("reply", "injected failure"));
            }

            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.replies.write().await.push(ReplyCall {
                tid,
                content: content.to_string(),
                as_uid,
                in_reply_to,
                pid,
            });
            Ok(pid)
        })
    }
}
