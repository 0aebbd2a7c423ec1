//! Remote platform client: topic creation and threaded replies.
//!
//! [`ForumClient`] wraps a NodeBB-style HTTP API behind the two traits the
//! engine needs: [`ThreadWriter`] (write side, v3 API) and
//! [`IdentityResolver`] (read side, v1 API). The client is built once from
//! an immutable [`ForumConfig`] — base URL, bearer token, optional proxy —
//! and passed around by reference; there is no ambient/global client.
//!
//! # Retry
//!
//! Every request runs under the configured [`RetryPolicy`]. Only errors
//! classified retryable by [`MirrorError::is_retryable()`] (timeouts,
//! connect failures, 5xx, 429) are retried; `NotFound` and auth errors
//! escalate immediately. The client does **not** suppress duplicate remote
//! posts on retry — deduplication is the caller's ledger's job.
//!
//! # Wire Format
//!
//! ```text
//! GET  /api/user/username/{name}?_uid=N          -> { "uid": ... }
//! POST /api/v3/topics        {cid,title,content,_uid}
//!                                                -> { "response": { "tid", "mainPid" } }
//! POST /api/v3/topics/{tid}  {content,_uid,toPid?}
//!                                                -> { "response": { "pid" } }
//! ```

use crate::config::ForumConfig;
use crate::error::{MirrorError, Result};
use crate::identity::IdentityResolver;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::store::BoxFuture;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-request timeout. Retries, not long waits, handle slow platforms.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Write side of the remote platform: one topic, then threaded replies.
pub trait ThreadWriter: Send + Sync + 'static {
    /// Create the remote thread's root post. Returns `(tid, pid)`.
    fn create_topic<'a>(
        &'a self,
        category: i64,
        title: &'a str,
        content: &'a str,
        as_uid: i64,
    ) -> BoxFuture<'a, (i64, i64)>;

    /// Post a reply into `tid`, optionally under an existing post.
    ///
    /// With `in_reply_to = None` the platform threads the reply as a
    /// top-level reply under the topic.
    fn reply<'a>(
        &'a self,
        tid: i64,
        content: &'a str,
        as_uid: i64,
        in_reply_to: Option<i64>,
    ) -> BoxFuture<'a, i64>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct TopicCreated {
    tid: i64,
    #[serde(rename = "mainPid")]
    main_pid: i64,
}

#[derive(Debug, Deserialize)]
struct PostCreated {
    pid: i64,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    uid: i64,
}

/// HTTP client for a NodeBB-style platform.
#[derive(Debug)]
pub struct ForumClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
    token: String,
    read_as_uid: i64,
    retry: RetryPolicy,
}

impl ForumClient {
    /// Build a client from an immutable config and retry policy.
    pub fn new(config: &ForumConfig, retry: RetryPolicy) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| MirrorError::Config(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| MirrorError::Config(format!("cannot build HTTP client: {}", e)))?;

        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| MirrorError::Config(format!("invalid base URL: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token: config.api_token.clone(),
            read_as_uid: config.read_as_uid,
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url> {
        self.base_url
            .join(path)
            .map_err(|e| MirrorError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Map a non-success status to the error taxonomy.
    ///
    /// 404 is handled by the callers that expect it (user lookup).
    fn error_for_status(operation: &str, status: StatusCode) -> MirrorError {
        let code = status.as_u16();
        match code {
            401 | 403 => MirrorError::Unauthorized {
                operation: operation.to_string(),
                status: code,
            },
            429 => MirrorError::transport_msg(operation, "rate limited"),
            c if status.is_server_error() => {
                MirrorError::transport_msg(operation, format!("server error {}", c))
            }
            c => MirrorError::Api {
                operation: operation.to_string(),
                status: c,
                message: "unexpected status".to_string(),
            },
        }
    }

    /// POST a v3 payload and unwrap the `response` envelope.
    async fn post_v3<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = self.endpoint(path)?;

        self.retry
            .run(operation, || {
                let url = url.clone();
                let body = body.clone();
                async move {
                    let start = Instant::now();
                    let result = async {
                        let resp = self
                            .http
                            .post(url)
                            .bearer_auth(&self.token)
                            .json(&body)
                            .send()
                            .await
                            .map_err(|e| MirrorError::transport(operation, e))?;

                        let status = resp.status();
                        if !status.is_success() {
                            return Err(Self::error_for_status(operation, status));
                        }

                        let envelope: ApiEnvelope<T> = resp
                            .json()
                            .await
                            .map_err(|e| MirrorError::malformed(operation, e))?;
                        Ok(envelope.response)
                    }
                    .await;

                    metrics::record_remote_request(operation, result.is_ok(), start.elapsed());
                    result
                }
            })
            .await
    }
}

impl ThreadWriter for ForumClient {
    fn create_topic<'a>(
        &'a self,
        category: i64,
        title: &'a str,
        content: &'a str,
        as_uid: i64,
    ) -> BoxFuture<'a, (i64, i64)> {
        Box::pin(async move {
            let created: TopicCreated = self
                .post_v3(
                    "create_topic",
                    "api/v3/topics",
                    json!({
                        "cid": category,
                        "title": title,
                        "content": content,
                        "_uid": as_uid,
                    }),
                )
                .await?;

            debug!(tid = created.tid, pid = created.main_pid, "Created remote topic");
            Ok((created.tid, created.main_pid))
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
            let mut body = json!({
                "content": content,
                "_uid": as_uid,
            });
            if let Some(pid) = in_reply_to {
                body["toPid"] = json!(pid);
            }

            let posted: PostCreated = self
                .post_v3("reply", &format!("api/v3/topics/{}", tid), body)
                .await?;

            debug!(tid, pid = posted.pid, in_reply_to, "Posted reply");
            Ok(posted.pid)
        })
    }
}

impl IdentityResolver for ForumClient {
    fn resolve<'a>(&'a self, username: &'a str) -> BoxFuture<'a, i64> {
        Box::pin(async move {
            let operation = "user_lookup";
            let url = self.endpoint(&format!("api/user/username/{}", username))?;

            self.retry
                .run(operation, || {
                    let url = url.clone();
                    async move {
                        let start = Instant::now();
                        let result = async {
                            let resp = self
                                .http
                                .get(url)
                                .query(&[("_uid", self.read_as_uid)])
                                .bearer_auth(&self.token)
                                .send()
                                .await
                                .map_err(|e| MirrorError::transport(operation, e))?;

                            let status = resp.status();
                            if status == StatusCode::NOT_FOUND {
                                return Err(MirrorError::UserNotFound {
                                    username: username.to_string(),
                                });
                            }
                            if !status.is_success() {
                                return Err(Self::error_for_status(operation, status));
                            }

                            let user: UserRecord = resp
                                .json()
                                .await
                                .map_err(|e| MirrorError::malformed(operation, e))?;
                            Ok(user.uid)
                        }
                        .await;

                        metrics::record_remote_request(operation, result.is_ok(), start.elapsed());
                        result
                    }
                })
                .await
        })
    }
}
