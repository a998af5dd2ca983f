//! Session pipeline for the bookshelf service
//!
//! Attaches bearer credentials to outgoing requests and recovers from an
//! expired access credential with a single coordinated refresh. Requests that
//! fail authorization while a refresh is in flight wait for it and are then
//! re-issued once; an unrecoverable refresh ends the session.
//!
//! ```text
//! SessionClient::send
//!   → authenticate → Transport
//!   → 401 (non-auth endpoint) → RefreshCoordinator (single-flight)
//!   → RetryDispatcher → caller
//! ```

mod client;
mod coordinator;
mod error;
mod metrics;
mod retry;
mod terminator;

#[cfg(test)]
mod test_support;

pub use client::{DEFAULT_REFRESH_TIMEOUT, SessionClient, SessionOptions};
pub use coordinator::{PendingRefresh, RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use error::{Error, Result, SESSION_EXPIRED_MESSAGE};
pub use retry::RetryDispatcher;
pub use terminator::{AuthSignal, SessionEvent, SessionTerminator, TerminationReason};
