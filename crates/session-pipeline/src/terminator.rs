//! Session termination and the authentication-status signal
//!
//! Termination clears the credential store, flips the shared "is
//! authenticated" signal to false, and asks the view layer to navigate to the
//! login entry point by broadcasting `SessionEvent::LoginRequired`.
//!
//! Clearing and the signal are idempotent. Every call still emits one
//! navigation request, so a second logout sends the user to login again.
//!
//! A termination caused by a failed refresh names the session generation the
//! refresh belonged to. If the user logged out or logged in again while the
//! refresh was in flight, that termination is dropped.
//!
//! Login, refresh completion and termination each change the store and the
//! signal together under `AuthSignal::transition()`, so the signal always
//! agrees with the last transition that reached the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use session_auth::{CredentialStore, Generation};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::metrics;

/// Capacity of the session event channel. Slow subscribers lag, they never
/// block termination.
const EVENT_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Explicit logout by the user
    Logout,
    /// The refresh credential was missing or rejected
    RefreshFailed,
}

impl TerminationReason {
    pub fn label(&self) -> &'static str {
        match self {
            TerminationReason::Logout => "logout",
            TerminationReason::RefreshFailed => "refresh_failed",
        }
    }
}

/// Notifications for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Navigate to the login entry point.
    LoginRequired { reason: TerminationReason },
}

/// Process-wide "is authenticated" flag, observable through `watch`.
pub struct AuthSignal {
    tx: watch::Sender<bool>,
    transitions: Mutex<()>,
}

impl AuthSignal {
    pub fn new(authenticated: bool) -> Self {
        let (tx, _) = watch::channel(authenticated);
        Self {
            tx,
            transitions: Mutex::new(()),
        }
    }

    /// Serializes session transitions. Hold it across the store change and
    /// the matching `set`. Never held across an await.
    pub(crate) fn transition(&self) -> MutexGuard<'_, ()> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Set the flag. Subscribers are notified only when the value changes.
    /// Returns the previous value.
    pub(crate) fn set(&self, authenticated: bool) -> bool {
        let mut previous = authenticated;
        self.tx.send_if_modified(|current| {
            previous = *current;
            if *current == authenticated {
                return false;
            }
            *current = authenticated;
            true
        });
        previous
    }
}

/// Ends sessions on logout or unrecoverable refresh failure.
pub struct SessionTerminator {
    store: Arc<CredentialStore>,
    signal: Arc<AuthSignal>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTerminator {
    pub fn new(store: Arc<CredentialStore>, signal: Arc<AuthSignal>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            signal,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Clear credentials, mark the session unauthenticated, then request
    /// navigation to login.
    pub fn terminate(&self, reason: TerminationReason) {
        self.end(reason, None);
    }

    /// Terminate only if `generation` is still the current session.
    /// Returns false when a logout or a new login got there first.
    pub fn terminate_session(&self, reason: TerminationReason, generation: Generation) -> bool {
        self.end(reason, Some(generation))
    }

    fn end(&self, reason: TerminationReason, generation: Option<Generation>) -> bool {
        let _transition = self.signal.transition();

        let cleared = match generation {
            Some(generation) => self.store.clear_in(generation),
            None => self.store.clear().map(|()| true),
        };
        match cleared {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    reason = reason.label(),
                    "session changed since refresh started, not terminating"
                );
                return false;
            }
            // Memory is already cleared; only the file is stale
            Err(e) => warn!(error = %e, "failed to persist cleared credentials"),
        }
        let was_authenticated = self.signal.set(false);

        // No subscribers is fine: nothing is listening for navigation
        let _ = self.events.send(SessionEvent::LoginRequired { reason });

        metrics::record_termination(reason.label());
        info!(
            reason = reason.label(),
            was_authenticated, "session terminated, login required"
        );
        true
    }
}
