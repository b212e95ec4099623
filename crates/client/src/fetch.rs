//! Authenticated request pipeline
//!
//! Attaches the current access token, and on a 401 refreshes once and replays
//! the request once. Ordinary error statuses are handed back as responses;
//! only transport failures become errors.

use crate::error::ClientError;
use crate::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
use crate::token_store::{AccessCredential, TokenStore};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a response came about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    /// First send, no refresh involved
    Direct,
    /// Second send after a refresh; never retried again
    Retried,
    /// The first send returned 401 and recovery failed; the 401 is returned as-is
    RefreshFailed(RefreshFailure),
    /// The body could not be replayed, so the request was sent once without retry
    NotRetryable,
}

/// One logical request: its template, the credential to send, and whether
/// the single retry has been spent.
pub struct RequestAttempt {
    request: RequestBuilder,
    credential: Option<AccessCredential>,
    retried: bool,
}

impl RequestAttempt {
    pub fn new(request: RequestBuilder, credential: Option<AccessCredential>) -> Self {
        Self {
            request,
            credential,
            retried: false,
        }
    }

    pub fn retried(&self) -> bool {
        self.retried
    }

    /// A sendable copy with the credential attached, or `None` if the body is a stream
    fn build(&self) -> Option<RequestBuilder> {
        self.request
            .try_clone()
            .map(|request| authorize(request, self.credential.as_ref()))
    }

    /// Consume the template for a one-shot send
    fn into_request(self) -> RequestBuilder {
        authorize(self.request, self.credential.as_ref())
    }

    /// Spend the retry on a new credential; `None` once it is already spent
    fn retry_with(mut self, credential: AccessCredential) -> Option<Self> {
        if self.retried {
            return None;
        }
        self.retried = true;
        self.credential = Some(credential);
        Some(self)
    }
}

fn authorize(request: RequestBuilder, credential: Option<&AccessCredential>) -> RequestBuilder {
    match credential {
        Some(credential) => request.bearer_auth(credential.expose()),
        None => request,
    }
}

/// Wraps outbound requests with credential handling and refresh-then-retry
pub struct AuthenticatedFetch {
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl AuthenticatedFetch {
    pub fn new(store: Arc<TokenStore>, refresher: Arc<RefreshCoordinator>) -> Self {
        Self { store, refresher }
    }

    /// Send a request with the current credential, refreshing and retrying once on 401
    ///
    /// # Errors
    ///
    /// Only transport failures (`ClientError::NetworkUnavailable`); HTTP error
    /// statuses, including a final 401, are returned as responses.
    pub async fn fetch(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let (response, _) = self.dispatch(request).await?;
        Ok(response)
    }

    /// Like [`fetch`](Self::fetch), also reporting how the response was obtained
    pub async fn dispatch(
        &self,
        request: RequestBuilder,
    ) -> Result<(Response, FetchDisposition), ClientError> {
        let mut attempt = RequestAttempt::new(request, self.store.get());

        loop {
            let Some(request) = attempt.build() else {
                warn!("Request body cannot be replayed, sending without retry");
                let response = attempt.into_request().send().await?;
                return Ok((response, FetchDisposition::NotRetryable));
            };

            let response = request.send().await?;
            let status = response.status();

            if status != StatusCode::UNAUTHORIZED {
                let disposition = if attempt.retried() {
                    FetchDisposition::Retried
                } else {
                    FetchDisposition::Direct
                };
                return Ok((response, disposition));
            }

            if attempt.retried() {
                debug!(url = %response.url(), "Still unauthorized after retry");
                return Ok((response, FetchDisposition::Retried));
            }

            debug!(url = %response.url(), "Unauthorized, attempting token refresh");
            let credential = match self.recover(attempt.credential.as_ref()).await {
                Ok(credential) => credential,
                Err(failure) => {
                    debug!(error = %failure, "Refresh failed, returning original 401");
                    return Ok((response, FetchDisposition::RefreshFailed(failure)));
                }
            };

            attempt = match attempt.retry_with(credential) {
                Some(next) => next,
                None => return Ok((response, FetchDisposition::Retried)),
            };
        }
    }

    /// Send a request and decode a JSON success body
    ///
    /// # Errors
    ///
    /// A 401 after a failed refresh maps to the refresh failure (usually
    /// `SessionExpired`); a 401 after the retry is `Unauthorized`; other
    /// statuses go through [`ClientError::from_status`].
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let (response, disposition) = self.dispatch(request).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        if status == StatusCode::UNAUTHORIZED
            && let FetchDisposition::RefreshFailed(failure) = disposition
        {
            return Err(failure.into());
        }
        Err(ClientError::from_status(status, message))
    }

    /// Find a credential to retry with after a 401
    async fn recover(
        &self,
        sent_with: Option<&AccessCredential>,
    ) -> Result<AccessCredential, RefreshFailure> {
        // Someone else already replaced the credential we were rejected with.
        if let Some(current) = self.store.get()
            && Some(&current) != sent_with
        {
            debug!("Credential changed while request was in flight, retrying with it");
            return Ok(current);
        }

        match self.refresher.refresh().await {
            RefreshOutcome::Success(credential) => Ok(credential),
            // A login landed during the exchange; its credential is the one to use.
            RefreshOutcome::Failure(RefreshFailure::Superseded) => match self.store.get() {
                Some(current) if Some(&current) != sent_with => {
                    debug!("Session replaced during refresh, retrying with new credential");
                    Ok(current)
                }
                _ => Err(RefreshFailure::Superseded),
            },
            RefreshOutcome::Failure(failure) => Err(failure),
        }
    }
}
