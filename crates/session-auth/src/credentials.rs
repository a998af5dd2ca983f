//! Persisted access/refresh credential slots
//!
//! Holds the current access and refresh token in a small JSON file that
//! survives restarts. All operations are synchronous and touch only the slot
//! they name. Both slots sit behind one mutex, so `clear()` is atomic with
//! respect to every reader.
//!
//! Every login starts a new session generation and every clear that removes
//! credentials ends it. A refresh that began in one generation can only write
//! into that same generation (`set_access_in`), so a logout or a new login
//! that lands while the refresh is in flight is never overwritten.
//!
//! Each mutation updates memory first and then persists via temp-file +
//! rename. If persisting fails the error is returned, but the in-memory value
//! stays updated so the running session keeps working.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The stored credentials of a logged-in session.
///
/// A refresh token never exists without an access token from the same or a
/// later login/refresh cycle.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access: Secret<String>,
    pub refresh: Option<Secret<String>>,
}

/// On-disk shape of the credential file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

/// Identifies one login session within this process.
pub type Generation = u64;

struct State {
    slots: Slots,
    generation: Generation,
}

/// Process-wide credential store, shared via `Arc`.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

impl CredentialStore {
    /// Load credentials from the given file path.
    ///
    /// A missing file is a cold start: the store begins empty and the empty
    /// file is written so later loads take the normal path.
    pub fn load(path: PathBuf) -> Result<Self> {
        let slots = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let slots: Slots = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                has_access = slots.access.is_some(),
                has_refresh = slots.refresh.is_some(),
                "loaded credentials"
            );
            slots
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let slots = Slots::default();
            write_atomic(&path, &slots)?;
            slots
        };

        Ok(Self::with_slots(Some(path), slots))
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_slots(None, Slots::default())
    }

    fn with_slots(path: Option<PathBuf>, slots: Slots) -> Self {
        Self {
            path,
            state: Mutex::new(State {
                slots,
                generation: 0,
            }),
        }
    }

    pub fn access(&self) -> Option<String> {
        self.lock().slots.access.clone()
    }

    pub fn refresh(&self) -> Option<String> {
        self.lock().slots.refresh.clone()
    }

    pub fn generation(&self) -> Generation {
        self.lock().generation
    }

    /// The refresh token and the session generation it belongs to, read
    /// under one lock.
    pub fn refresh_in_session(&self) -> (Generation, Option<String>) {
        let state = self.lock();
        (state.generation, state.slots.refresh.clone())
    }

    /// Both slots read under one lock.
    pub fn snapshot(&self) -> Option<CredentialPair> {
        let state = self.lock();
        let slots = &state.slots;
        let access = slots.access.clone()?;
        Some(CredentialPair {
            access: Secret::new(access),
            refresh: slots.refresh.clone().map(Secret::new),
        })
    }

    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.slots.access.is_none() && state.slots.refresh.is_none()
    }

    pub fn set_access(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.update("access", None, |slots| slots.access = Some(token))
            .map(|_| ())
    }

    /// Store a refreshed access token, but only while `generation` is still
    /// the current session.
    ///
    /// Returns `Ok(false)` and leaves the store untouched when the session
    /// ended or was replaced by a new login in the meantime.
    pub fn set_access_in(&self, generation: Generation, token: impl Into<String>) -> Result<bool> {
        let token = token.into();
        self.update("refreshed access", Some(generation), |slots| {
            slots.access = Some(token)
        })
    }

    pub fn set_refresh(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.update("refresh", None, |slots| slots.refresh = Some(token))
            .map(|_| ())
    }

    /// Store both tokens from a successful login in one step. Starts a new
    /// session generation.
    pub fn store_login(&self, access: impl Into<String>, refresh: impl Into<String>) -> Result<()> {
        let (access, refresh) = (access.into(), refresh.into());
        let mut state = self.lock();
        state.generation += 1;
        state.slots = Slots {
            access: Some(access),
            refresh: Some(refresh),
        };
        debug!(op = "login", generation = state.generation, "credentials updated");
        self.persist(&state.slots)
    }

    /// Remove both slots.
    pub fn clear(&self) -> Result<()> {
        self.update("clear", None, |slots| *slots = Slots::default())
            .map(|_| ())
    }

    /// Remove both slots if `generation` is still the current session.
    pub fn clear_in(&self, generation: Generation) -> Result<bool> {
        self.update("clear", Some(generation), |slots| *slots = Slots::default())
    }

    /// Apply `change` and persist if anything changed. The lock is held across
    /// the write so concurrent mutations reach disk in order.
    ///
    /// With `expected` set, nothing happens unless it matches the current
    /// generation. A change that empties the store ends the generation.
    fn update(
        &self,
        op: &'static str,
        expected: Option<Generation>,
        change: impl FnOnce(&mut Slots),
    ) -> Result<bool> {
        let mut state = self.lock();
        if expected.is_some_and(|generation| generation != state.generation) {
            debug!(op, current = state.generation, "session changed, update skipped");
            return Ok(false);
        }

        let before = state.slots.clone();
        change(&mut state.slots);
        if state.slots == before {
            return Ok(true);
        }
        if state.slots == Slots::default() {
            state.generation += 1;
        }
        debug!(op, generation = state.generation, "credentials updated");
        self.persist(&state.slots).map(|()| true)
    }

    fn persist(&self, slots: &Slots) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, slots),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write the credential file atomically with 0600 permissions on unix.
fn write_atomic(path: &Path, slots: &Slots) -> Result<()> {
    let json = serde_json::to_string_pretty(slots)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
