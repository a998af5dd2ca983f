//! Session-aware request pipeline
//!
//! Every request passes through: authenticate → transport → (401 on a
//! non-auth request) refresh coordinator → retry dispatcher.

use std::sync::Arc;
use std::time::Duration;

use session_auth::{
    AccountType, CredentialPair, CredentialStore, RegisteredUser, authenticate, login_request,
    parse_login, parse_registered, register_request,
};
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, info, info_span};
use transport::{Request, Response, Transport};
use uuid::Uuid;

use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::retry::RetryDispatcher;
use crate::terminator::{AuthSignal, SessionEvent, SessionTerminator, TerminationReason};

/// Default bound on a single refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Elapse is treated as a failed refresh.
    pub refresh_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Entry point for authenticated calls to the bookshelf service.
///
/// Cheap to share behind an `Arc`; all clones of the `Arc` see the same
/// credential store, refresh state and authentication signal.
pub struct SessionClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    signal: Arc<AuthSignal>,
    terminator: Arc<SessionTerminator>,
    coordinator: Arc<RefreshCoordinator>,
    retry: RetryDispatcher,
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        options: SessionOptions,
    ) -> Self {
        let signal = Arc::new(AuthSignal::new(store.access().is_some()));
        let terminator = Arc::new(SessionTerminator::new(store.clone(), signal.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport.clone(),
            terminator.clone(),
            signal.clone(),
            options.refresh_timeout,
        ));
        let retry = RetryDispatcher::new(transport.clone());

        Self {
            transport,
            store,
            signal,
            terminator,
            coordinator,
            retry,
        }
    }

    /// Send `request` with the current access credential, recovering once
    /// from an expired credential.
    ///
    /// Non-401 statuses come back as `Ok` unmodified.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        let span = info_span!(
            "session_request",
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        let request = authenticate(request, self.store.access().as_deref());
        let response = self.transport.send(&request).await?;
        if !response.is_unauthorized() {
            debug!(status = %response.status, "request completed");
            return Ok(response);
        }

        let Some(pending) = self.coordinator.admit(&request) else {
            return Err(Error::Unauthorized {
                path: request.path.clone(),
                status: response.status.as_u16(),
            });
        };
        let outcome = pending.settled().await;
        self.retry.dispatch(&request, outcome).await
    }

    /// Exchange username and password for a credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = match self.send(login_request(username, password)).await {
            Err(Error::Unauthorized { .. }) => return Err(Error::InvalidCredentials),
            other => other?,
        };
        if !response.status.is_success() {
            return Err(Error::LoginFailed {
                status: response.status.as_u16(),
                message: response.text(),
            });
        }

        let tokens = parse_login(&response)?;
        let stored = {
            let _transition = self.signal.transition();
            // Memory holds the new pair even if persisting fails
            let stored = self
                .store
                .store_login(tokens.access_token, tokens.refresh_token);
            self.signal.set(true);
            stored
        };
        stored?;
        info!(username, "logged in");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
        account_type: AccountType,
    ) -> Result<RegisteredUser> {
        let request = register_request(first_name, last_name, email, password, account_type);
        let response = self.send(request).await?;
        if !response.status.is_success() {
            return Err(Error::RegistrationFailed {
                status: response.status.as_u16(),
                message: response.text(),
            });
        }

        let user = parse_registered(&response)?;
        info!(email = %user.email, account_type = ?user.account_type, "registered account");
        Ok(user)
    }

    /// End the session. Safe to call when already logged out.
    pub fn logout(&self) {
        self.terminator.terminate(TerminationReason::Logout);
    }

    pub fn is_authenticated(&self) -> bool {
        self.signal.get()
    }

    pub fn subscribe_authenticated(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    /// Navigation requests for the view layer.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.terminator.subscribe()
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        self.store.snapshot()
    }
}
