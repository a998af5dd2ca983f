//! Re-issue requests released by a refresh cycle
//!
//! A released request is resubmitted exactly once with the new access
//! credential. A second 401 is returned as `RetryExhausted` and never starts
//! another cycle. A failed cycle becomes the single terminal
//! `SessionExpired` error.

use std::sync::Arc;

use session_auth::authenticate;
use tracing::{debug, warn};
use transport::{Request, Response, Transport};

use crate::coordinator::RefreshOutcome;
use crate::error::{Error, Result};
use crate::metrics;

pub struct RetryDispatcher {
    transport: Arc<dyn Transport>,
}

impl RetryDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Resolve `request` against a settled refresh outcome.
    pub async fn dispatch(&self, request: &Request, outcome: RefreshOutcome) -> Result<Response> {
        let access = match outcome {
            Ok(access) => access,
            Err(failure) => {
                debug!(path = %request.path, reason = failure.label(), "session expired, rejecting request");
                metrics::record_retry("session_expired");
                return Err(Error::SessionExpired);
            }
        };

        let retried = authenticate(request.clone(), Some(access.expose()));
        let response = self.transport.send(&retried).await?;

        if response.is_unauthorized() {
            warn!(path = %request.path, "request rejected again after refresh, not retrying");
            metrics::record_retry("rejected");
            return Err(Error::RetryExhausted {
                path: request.path.clone(),
                status: response.status.as_u16(),
            });
        }

        debug!(path = %request.path, status = %response.status, "retried with refreshed credential");
        metrics::record_retry("success");
        Ok(response)
    }
}
