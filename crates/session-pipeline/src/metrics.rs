//! Session pipeline counters
//!
//! - `session_refresh_total` (counter): label `outcome`
//! - `session_retry_total` (counter): label `outcome`
//! - `session_terminations_total` (counter): label `reason`
//!
//! Recorded through the `metrics` facade; the host process decides whether a
//! recorder is installed.

/// Record a settled refresh cycle.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

/// Record the fate of a request released after a refresh cycle.
pub fn record_retry(outcome: &'static str) {
    metrics::counter!("session_retry_total", "outcome" => outcome).increment(1);
}

/// Record a session termination.
pub fn record_termination(reason: &'static str) {
    metrics::counter!("session_terminations_total", "reason" => reason).increment(1);
}
