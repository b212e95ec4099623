//! Single-flight access token refresh
//!
//! The refresh credential lives in an HTTP-only cookie held by the transport's
//! cookie jar; this module never sees it. It POSTs the refresh endpoint and
//! installs whatever access token comes back.
//!
//! At most one exchange is in flight per coordinator. Callers that arrive
//! while one is running get a clone of the same shared future and observe the
//! same outcome. The exchange runs on its own task, so a caller that gives up
//! waiting does not cancel a refresh other callers depend on, and the result
//! still lands in the [`TokenStore`].

use crate::backend::Backend;
use crate::token_store::{AccessCredential, Generation, TokenStore};
use crate::types::AccessTokenResponse;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of a refresh exchange, shared by every waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success(AccessCredential),
    Failure(RefreshFailure),
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Why a refresh did not produce a credential
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// The refresh cookie is missing, expired or revoked (4xx)
    #[error("refresh rejected with status {status}")]
    ExpiredOrRevoked { status: u16 },

    /// Transport failure; the current access token may still be valid
    #[error("refresh endpoint unreachable: {0}")]
    Network(String),

    /// Refresh endpoint failed (5xx)
    #[error("refresh endpoint returned {status}")]
    Server { status: u16 },

    /// 2xx without a usable access token
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// A login or logout replaced the session while the exchange was running
    #[error("session changed during refresh")]
    Superseded,
}

impl RefreshFailure {
    /// Whether this failure ends the session
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::ExpiredOrRevoked { .. })
    }
}

type SharedOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

/// The one outstanding exchange
struct PendingRefresh {
    id: u64,
    outcome: SharedOutcome,
}

type PendingSlot = Arc<Mutex<Option<PendingRefresh>>>;

fn lock_pending(slot: &PendingSlot) -> MutexGuard<'_, Option<PendingRefresh>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collapses concurrent refresh requests into one network exchange
pub struct RefreshCoordinator {
    backend: Backend,
    store: Arc<TokenStore>,
    pending: PendingSlot,
    exchanges: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(backend: Backend, store: Arc<TokenStore>) -> Self {
        Self {
            backend,
            store,
            pending: Arc::new(Mutex::new(None)),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Obtain a fresh access token, joining an in-flight exchange if there is one
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.join_or_start().await
    }

    /// Number of network exchanges started so far
    pub fn exchanges(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Whether an exchange is currently outstanding
    pub fn in_flight(&self) -> bool {
        lock_pending(&self.pending).is_some()
    }

    fn join_or_start(&self) -> SharedOutcome {
        let mut pending = lock_pending(&self.pending);

        if let Some(existing) = pending.as_ref() {
            debug!(refresh_id = existing.id, "Joining in-flight refresh");
            return existing.outcome.clone();
        }

        let id = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        let (generation, _) = self.store.snapshot();
        debug!(refresh_id = id, "Starting refresh exchange");

        // The slot lock is held until the handle is installed, so the task
        // cannot clear the slot before it has been filled.
        let task = tokio::spawn(run_exchange(
            self.backend.clone(),
            self.store.clone(),
            self.pending.clone(),
            id,
            generation,
        ));
        let outcome = task
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    RefreshOutcome::Failure(RefreshFailure::Network(format!(
                        "refresh task aborted: {e}"
                    )))
                })
            })
            .boxed()
            .shared();

        *pending = Some(PendingRefresh {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }
}

async fn run_exchange(
    backend: Backend,
    store: Arc<TokenStore>,
    pending: PendingSlot,
    id: u64,
    generation: Generation,
) -> RefreshOutcome {
    let outcome = exchange(&backend).await;
    let outcome = settle(&store, generation, outcome);

    match &outcome {
        RefreshOutcome::Success(_) => info!(refresh_id = id, "Access token refreshed"),
        RefreshOutcome::Failure(failure) => {
            warn!(refresh_id = id, error = %failure, "Access token refresh failed");
        }
    }

    // The store is settled before the slot is released, so anyone who sees no
    // pending refresh also sees its result.
    let mut slot = lock_pending(&pending);
    if slot.as_ref().is_some_and(|p| p.id == id) {
        *slot = None;
    }

    outcome
}

async fn exchange(backend: &Backend) -> RefreshOutcome {
    let response = match backend
        .request(Method::POST, &backend.endpoints().refresh)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return RefreshOutcome::Failure(RefreshFailure::Network(e.to_string())),
    };

    let status = response.status();
    if status.is_success() {
        match response.json::<AccessTokenResponse>().await {
            Ok(body) => match body.into_token() {
                Some(token) => RefreshOutcome::Success(AccessCredential::new(token)),
                None => RefreshOutcome::Failure(RefreshFailure::InvalidResponse(
                    "missing accessToken".to_string(),
                )),
            },
            Err(e) => RefreshOutcome::Failure(RefreshFailure::InvalidResponse(e.to_string())),
        }
    } else if status.is_client_error() {
        RefreshOutcome::Failure(RefreshFailure::ExpiredOrRevoked {
            status: status.as_u16(),
        })
    } else {
        RefreshOutcome::Failure(RefreshFailure::Server {
            status: status.as_u16(),
        })
    }
}

/// Apply an exchange result to the store, unless the session moved on meanwhile
fn settle(store: &TokenStore, generation: Generation, outcome: RefreshOutcome) -> RefreshOutcome {
    match outcome {
        RefreshOutcome::Success(credential) => {
            if store.replace_if(generation, Some(credential.clone())) {
                RefreshOutcome::Success(credential)
            } else {
                debug!("Discarding refreshed token, session changed during exchange");
                RefreshOutcome::Failure(RefreshFailure::Superseded)
            }
        }
        RefreshOutcome::Failure(failure) => {
            if failure.clears_session() && !store.replace_if(generation, None) {
                debug!("Session changed during exchange, keeping current token");
            }
            RefreshOutcome::Failure(failure)
        }
    }
}
