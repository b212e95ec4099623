//! Route guard state machine
//!
//! `Checking` on creation and at the start of every [`SessionGuard::evaluate`];
//! each evaluation settles in `Authenticated` or `Unauthenticated` and the state
//! stays there until the next evaluation is requested. Any doubt settles as
//! `Unauthenticated`.

use crate::backend::Backend;
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::token_store::{AccessCredential, TokenStore};
use reqwest::Method;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info};

/// What a protected view should render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Evaluation in progress, show a loading state
    Checking,
    /// Show protected content
    Authenticated,
    /// Show the "not logged in" view with a link to login
    Unauthenticated,
}

impl SessionState {
    /// Whether the state is terminal for the current evaluation
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Checking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Authenticated => "ok",
            Self::Unauthenticated => "not_logged_in",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Validation {
    Accepted,
    Rejected(u16),
    Unreachable,
}

/// Session state machine consulted before rendering protected views
pub struct SessionGuard {
    backend: Backend,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    validate_existing: bool,
    state_tx: watch::Sender<SessionState>,
    // Bumped by every evaluation and invalidation; only the latest may publish.
    epoch: Mutex<u64>,
}

impl SessionGuard {
    pub fn new(
        backend: Backend,
        store: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        validate_existing: bool,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Checking);
        Self {
            backend,
            store,
            refresher,
            validate_existing,
            state_tx,
            epoch: Mutex::new(0),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Re-check the session and settle in a terminal state
    ///
    /// Performs at most one guard request and one refresh. If the returned
    /// future is dropped before it completes, the guard settles as
    /// `Unauthenticated` rather than staying in `Checking`. An evaluation
    /// overtaken by a logout or a newer evaluation does not publish its result.
    pub async fn evaluate(&self) -> SessionState {
        let epoch = self.advance(SessionState::Checking);
        let mut pending = PendingEvaluation {
            guard: self,
            epoch,
            settled: false,
        };

        let mut state = self.check().await;
        if state == SessionState::Authenticated && !self.store.is_authenticated() {
            debug!("Session cleared during evaluation");
            state = SessionState::Unauthenticated;
        }

        self.settle(epoch, state);
        pending.settled = true;
        state
    }

    /// Mark the session as gone without a network round trip
    ///
    /// Any evaluation still running will not overwrite this.
    pub fn invalidate(&self) {
        self.advance(SessionState::Unauthenticated);
    }

    /// Start a new epoch and publish `state` under it
    fn advance(&self, state: SessionState) -> u64 {
        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        self.transition(state);
        *epoch
    }

    /// Publish `state` if no newer evaluation or invalidation started since `epoch`
    fn settle(&self, epoch: u64, state: SessionState) {
        let current = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == epoch {
            self.transition(state);
        } else {
            debug!(state = %state, "Evaluation superseded, not publishing");
        }
    }

    async fn check(&self) -> SessionState {
        match self.store.get() {
            Some(credential) if self.validate_existing => match self.validate(&credential).await {
                Validation::Accepted => SessionState::Authenticated,
                Validation::Rejected(status) => {
                    debug!(status, "Stored credential rejected, attempting refresh");
                    self.recover().await
                }
                Validation::Unreachable => SessionState::Unauthenticated,
            },
            Some(_) => SessionState::Authenticated,
            None => {
                debug!("No access token, attempting silent refresh");
                self.recover().await
            }
        }
    }

    async fn validate(&self, credential: &AccessCredential) -> Validation {
        let result = self
            .backend
            .request(Method::GET, &self.backend.endpoints().guard)
            .bearer_auth(credential.expose())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => Validation::Accepted,
            Ok(response) => Validation::Rejected(response.status().as_u16()),
            Err(e) => {
                debug!(error = %e, "Guard endpoint unreachable");
                Validation::Unreachable
            }
        }
    }

    async fn recover(&self) -> SessionState {
        match self.refresher.refresh().await {
            RefreshOutcome::Success(_) => SessionState::Authenticated,
            RefreshOutcome::Failure(failure) => {
                debug!(error = %failure, "Silent refresh failed");
                SessionState::Unauthenticated
            }
        }
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Session state changed");
        }
    }
}

/// Settles the guard as `Unauthenticated` if an evaluation is abandoned midway
struct PendingEvaluation<'a> {
    guard: &'a SessionGuard,
    epoch: u64,
    settled: bool,
}

impl Drop for PendingEvaluation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.settle(self.epoch, SessionState::Unauthenticated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(SessionState::Checking.to_string(), "checking");
        assert_eq!(SessionState::Authenticated.to_string(), "ok");
        assert_eq!(SessionState::Unauthenticated.to_string(), "not_logged_in");
        assert!(!SessionState::Checking.is_settled());
        assert!(SessionState::Authenticated.is_settled());
        assert!(SessionState::Unauthenticated.is_settled());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::Unauthenticated).unwrap();
        assert_eq!(json, "\"unauthenticated\"");
    }
}
