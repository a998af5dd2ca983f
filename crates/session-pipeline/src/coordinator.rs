//! Single-flight refresh coordination
//!
//! Decides, for every 401 observed on a completed request, whether to ignore
//! it (auth endpoints), attach to the refresh already in flight, or start a
//! new one. At most one refresh call is in flight at any time.
//!
//! State machine:
//! - Idle → Refreshing: first 401 on a non-auth request; a refresh task is spawned
//! - Refreshing: further 401s park on the same cycle, no new refresh call
//! - Refreshing → Idle: the refresh settles; every parked caller is released
//!   with the same outcome
//!
//! A cycle belongs to the session generation that was current when it
//! started. If a logout or a new login lands while the refresh is in flight,
//! the cycle's result is not applied: a new access credential is discarded
//! and a failure does not terminate the newer session. Callers parked on such
//! a cycle are released with `RefreshFailure::Superseded`.
//!
//! Each cycle owns a `watch` channel. Callers clone its receiver under the
//! state lock, before the refresh call is issued, so a release is never
//! missed. The refresh runs on its own task: a caller that gives up cannot
//! strand the others or leave the state stuck in Refreshing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::Secret;
use session_auth::{CredentialStore, Generation, authenticate, parse_refresh, refresh_request};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use transport::{Request, Transport};

use crate::metrics;
use crate::terminator::{AuthSignal, SessionTerminator, TerminationReason};

/// Settled result of one refresh cycle: the new access token, or why there
/// is none.
pub type RefreshOutcome = std::result::Result<Secret<String>, RefreshFailure>;

/// Why a refresh cycle failed. Every variant ends the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh credential stored")]
    Unavailable,

    #[error("refresh endpoint returned {0}")]
    Rejected(u16),

    #[error("refresh call failed: {0}")]
    Transport(String),

    #[error("refresh call exceeded {0:?}")]
    TimedOut(Duration),

    #[error("unusable refresh response: {0}")]
    Malformed(String),

    #[error("refresh task ended without an outcome")]
    Abandoned,

    #[error("session ended or changed while refreshing")]
    Superseded,
}

impl RefreshFailure {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshFailure::Unavailable => "unavailable",
            RefreshFailure::Rejected(_) => "rejected",
            RefreshFailure::Transport(_) => "transport",
            RefreshFailure::TimedOut(_) => "timeout",
            RefreshFailure::Malformed(_) => "malformed",
            RefreshFailure::Abandoned => "abandoned",
            RefreshFailure::Superseded => "superseded",
        }
    }
}

type OutcomeSender = watch::Sender<Option<RefreshOutcome>>;
type OutcomeReceiver = watch::Receiver<Option<RefreshOutcome>>;

/// What the task running a new cycle needs: where to publish, and the session
/// the cycle belongs to.
struct NewCycle {
    sender: OutcomeSender,
    generation: Generation,
    refresh: Option<String>,
}

enum RefreshState {
    Idle,
    Refreshing {
        outcome: OutcomeReceiver,
        parked: usize,
    },
}

/// A caller attached to a refresh cycle.
pub struct PendingRefresh {
    outcome: OutcomeReceiver,
    started: bool,
}

impl PendingRefresh {
    /// Whether this caller's 401 started the cycle.
    pub fn started_refresh(&self) -> bool {
        self.started
    }

    /// Wait for the cycle to settle.
    pub async fn settled(mut self) -> RefreshOutcome {
        let settled = match self.outcome.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        settled.unwrap_or(Err(RefreshFailure::Abandoned))
    }
}

/// Sole owner and writer of the process-wide refresh state.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    terminator: Arc<SessionTerminator>,
    signal: Arc<AuthSignal>,
    refresh_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        transport: Arc<dyn Transport>,
        terminator: Arc<SessionTerminator>,
        signal: Arc<AuthSignal>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            store,
            transport,
            terminator,
            signal,
            refresh_timeout,
        }
    }

    /// Handle a 401 on `request`.
    ///
    /// Returns `None` for auth endpoints, which never enter the state machine.
    /// Otherwise the caller is attached to the in-flight cycle, starting one
    /// if the state is Idle.
    pub fn admit(self: &Arc<Self>, request: &Request) -> Option<PendingRefresh> {
        if request.is_auth_endpoint() {
            debug!(path = %request.path, "401 from auth endpoint, not refreshing");
            return None;
        }

        let (pending, cycle) = self.begin_or_join();
        if let Some(cycle) = cycle {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = coordinator.refresh_access(cycle.refresh.as_deref()).await;
                coordinator.complete(&cycle.sender, cycle.generation, outcome);
            });
        }
        Some(pending)
    }

    /// Callers attached to the in-flight cycle, 0 when Idle.
    pub fn parked(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { parked, .. } => *parked,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Join the current cycle, or move Idle → Refreshing and hand back what
    /// the new cycle's task needs.
    fn begin_or_join(&self) -> (PendingRefresh, Option<NewCycle>) {
        let mut state = self.lock_state();

        if let RefreshState::Refreshing { outcome, parked } = &mut *state {
            // A closed channel means the refresh task died; start over
            if outcome.has_changed().is_ok() {
                *parked += 1;
                debug!(parked = *parked, "refresh in flight, parking caller");
                return (
                    PendingRefresh {
                        outcome: outcome.clone(),
                        started: false,
                    },
                    None,
                );
            }
            warn!("previous refresh cycle ended without settling, starting a new one");
        }

        let (sender, outcome) = watch::channel(None);
        let (generation, refresh) = self.store.refresh_in_session();
        *state = RefreshState::Refreshing {
            outcome: outcome.clone(),
            parked: 1,
        };
        info!(generation, "access credential rejected, starting refresh");
        (
            PendingRefresh {
                outcome,
                started: true,
            },
            Some(NewCycle {
                sender,
                generation,
                refresh,
            }),
        )
    }

    /// Exchange `refresh` for a new access credential.
    async fn refresh_access(&self, refresh: Option<&str>) -> RefreshOutcome {
        let Some(refresh) = refresh else {
            return Err(RefreshFailure::Unavailable);
        };
        let request = authenticate(refresh_request(refresh), self.store.access().as_deref());

        let response =
            match tokio::time::timeout(self.refresh_timeout, self.transport.send(&request)).await {
                Err(_) => return Err(RefreshFailure::TimedOut(self.refresh_timeout)),
                Ok(Err(e)) => return Err(RefreshFailure::Transport(e.to_string())),
                Ok(Ok(response)) => response,
            };
        if !response.status.is_success() {
            return Err(RefreshFailure::Rejected(response.status.as_u16()));
        }

        let refreshed =
            parse_refresh(&response).map_err(|e| RefreshFailure::Malformed(e.to_string()))?;
        Ok(Secret::new(refreshed.access_token))
    }

    /// Refreshing → Idle, then release every parked caller.
    ///
    /// On success the new access credential is stored first. On failure the
    /// session is terminated first, so released callers see a cleared store.
    /// Either only happens if `generation` is still the current session.
    fn complete(&self, sender: &OutcomeSender, generation: Generation, outcome: RefreshOutcome) {
        let outcome = match outcome {
            Ok(access) => self.apply_refreshed(generation, access),
            Err(failure) => Err(failure),
        };

        let parked = {
            let mut state = self.lock_state();
            let parked = match &*state {
                RefreshState::Refreshing { parked, .. } => *parked,
                RefreshState::Idle => 0,
            };
            *state = RefreshState::Idle;
            parked
        };

        match &outcome {
            Ok(_) => {
                metrics::record_refresh("success");
                info!(parked, "refresh succeeded, releasing parked callers");
            }
            Err(RefreshFailure::Superseded) => {
                metrics::record_refresh("superseded");
                info!(parked, "session changed during refresh, discarding refreshed credential");
            }
            Err(failure) => {
                metrics::record_refresh(failure.label());
                warn!(parked, reason = failure.label(), error = %failure, "refresh failed, ending session");
                if !self
                    .terminator
                    .terminate_session(TerminationReason::RefreshFailed, generation)
                {
                    info!(parked, "session changed during refresh, keeping the new session");
                }
            }
        }

        sender.send_replace(Some(outcome));
    }

    /// Store the refreshed access credential if its session is still current.
    fn apply_refreshed(&self, generation: Generation, access: Secret<String>) -> RefreshOutcome {
        let _transition = self.signal.transition();
        match self.store.set_access_in(generation, access.expose().as_str()) {
            Ok(true) => {}
            Ok(false) => return Err(RefreshFailure::Superseded),
            // Memory holds the new credential; only the file is stale
            Err(e) => warn!(error = %e, "failed to persist refreshed access credential"),
        }
        self.signal.set(true);
        Ok(access)
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
