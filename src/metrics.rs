//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Poll cycles and entries read
//! - Entries mirrored / skipped
//! - Remote request outcomes and latency
//! - Retry pressure
//! - Ledger persistence
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `mirror_` and follow Prometheus
//! conventions: counters end in `_total`, gauges represent current state,
//! histograms track distributions.
//!
//! # Usage
//!
//! ```rust,no_run
//! use thread_mirror::metrics;
//! use std::time::Duration;
//!
//! // In the engine after posting an entry
//! metrics::record_entry_mirrored("human");
//!
//! // In the client after a request
//! metrics::record_remote_request("reply", true, Duration::from_millis(80));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one poll of the log and how many new entries it surfaced.
pub fn record_poll(new_entries: usize) {
    counter!("mirror_polls_total").increment(1);
    if new_entries > 0 {
        counter!("mirror_entries_read_total").increment(new_entries as u64);
    }
}

/// Record an entry successfully mirrored to the remote thread.
pub fn record_entry_mirrored(role: &str) {
    counter!("mirror_entries_mirrored_total", "role" => role.to_string()).increment(1);
}

/// Record an entry processed without a remote effect.
///
/// Reasons: `system`, `unrecognized_role`, `already_mirrored`.
pub fn record_entry_skipped(reason: &'static str) {
    counter!("mirror_entries_skipped_total", "reason" => reason).increment(1);
}

/// Record a reply posted top-level because its parent had no remote mapping.
pub fn record_orphaned_reply() {
    counter!("mirror_orphaned_replies_total").increment(1);
}

/// Record a remote thread created.
pub fn record_topic_created() {
    counter!("mirror_topics_created_total").increment(1);
}

/// Record a remote request outcome and latency.
pub fn record_remote_request(operation: &'static str, success: bool, latency: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!("mirror_remote_requests_total", "operation" => operation, "status" => status)
        .increment(1);
    histogram!("mirror_remote_latency_seconds", "operation" => operation)
        .record(latency.as_secs_f64());
}

/// Record a retry of a remote operation.
pub fn record_retry(operation: &str) {
    counter!("mirror_remote_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record a ledger write (mapping insert or cursor advancement).
pub fn record_ledger_persist(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("mirror_ledger_persist_total", "status" => status).increment(1);
}

/// Record the engine state as a gauge.
pub fn record_engine_state(state: &str) {
    gauge!("mirror_engine_state", "state" => state.to_string()).set(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The metrics facade is a no-op without an installed recorder; these
    // tests just exercise the call paths.

    #[test]
    fn test_record_poll() {
        record_poll(0);
        record_poll(5);
    }

    #[test]
    fn test_record_entry_outcomes() {
        record_entry_mirrored("human");
        record_entry_mirrored("ai");
        record_entry_skipped("system");
        record_entry_skipped("unrecognized_role");
        record_orphaned_reply();
    }

    #[test]
    fn test_record_remote() {
        record_topic_created();
        record_remote_request("reply", true, Duration::from_millis(10));
        record_remote_request("user_lookup", false, Duration::from_millis(10));
        record_retry("reply");
    }

    #[test]
    fn test_record_ledger_and_state() {
        record_ledger_persist(true);
        record_ledger_persist(false);
        record_engine_state("Polling");
    }
}
