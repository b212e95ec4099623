//! Session client facade

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fetch::AuthenticatedFetch;
use crate::guard::{SessionGuard, SessionState};
use crate::lifecycle::{Credentials, Registration, SessionLifecycle};
use crate::refresh::RefreshCoordinator;
use crate::token_store::{AccessCredential, TokenStore};
use futures::future::BoxFuture;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Inner {
    config: ClientConfig,
    backend: Backend,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    fetch: AuthenticatedFetch,
    guard: SessionGuard,
    lifecycle: SessionLifecycle,
}

/// Entry point for the UI layer
///
/// Clones share one session: one token store, one cookie jar, one refresh
/// coordinator and one guard.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.inner.backend.base_url()
    }

    /// Effective configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The credential store backing this session
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    /// The refresh coordinator backing this session
    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresher
    }

    /// Create a request builder for a path; credentials are attached at send time
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.backend.request(method, path)
    }

    /// Log in and store the access token
    pub async fn login(&self, credentials: &Credentials) -> Result<AccessCredential, ClientError> {
        self.inner.lifecycle.login(credentials).await
    }

    /// Create an account
    pub async fn register(&self, registration: &Registration) -> Result<Value, ClientError> {
        self.inner.lifecycle.register(registration).await
    }

    /// Clear the session immediately and notify the server in the background
    ///
    /// The returned future resolves once the server answered; awaiting it is optional.
    pub fn logout(&self) -> BoxFuture<'static, ()> {
        let notify = self.inner.lifecycle.logout();
        self.inner.guard.invalidate();
        notify
    }

    /// Send a request through the refresh-and-retry pipeline
    pub async fn fetch_authenticated(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        self.inner.fetch.fetch(request).await
    }

    /// Send a request through the pipeline and decode the JSON body
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.inner.fetch.execute(request).await
    }

    /// Ask the backend whether the current access token is valid
    pub async fn verify_token(&self) -> Result<Value, ClientError> {
        let path = self.inner.config.endpoints.verify.clone();
        self.execute(self.request(Method::GET, &path)).await
    }

    /// Re-check the session before rendering a protected view
    pub async fn evaluate(&self) -> SessionState {
        self.inner.guard.evaluate().await
    }

    /// Last settled (or in-progress) guard state
    pub fn session_state(&self) -> SessionState {
        self.inner.guard.state()
    }

    /// Subscribe to guard state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.guard.subscribe()
    }
}

/// Builder for SessionClient
#[derive(Default)]
pub struct SessionClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    validate_on_evaluate: Option<bool>,
    token_store: Option<Arc<TokenStore>>,
}

impl SessionClientBuilder {
    /// Start from a full configuration; individual setters override it
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Whether `evaluate()` validates an existing token against the guard endpoint
    pub fn validate_on_evaluate(mut self, validate: bool) -> Self {
        self.validate_on_evaluate = Some(validate);
        self
    }

    /// Use an existing token store instead of a fresh one
    pub fn token_store(mut self, store: Arc<TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let mut config = match (self.config, self.base_url.as_ref()) {
            (Some(config), _) => config,
            (None, Some(_)) => ClientConfig::default(),
            (None, None) => {
                return Err(ClientError::Configuration("base_url is required".into()));
            }
        };
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout.as_secs().max(1);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(validate) = self.validate_on_evaluate {
            config.validate_on_evaluate = validate;
        }

        let backend = Backend::new(&config)?;
        let store = self.token_store.unwrap_or_default();
        let refresher = Arc::new(RefreshCoordinator::new(backend.clone(), store.clone()));
        let fetch = AuthenticatedFetch::new(store.clone(), refresher.clone());
        let guard = SessionGuard::new(
            backend.clone(),
            store.clone(),
            refresher.clone(),
            config.validate_on_evaluate,
        );
        let lifecycle = SessionLifecycle::new(backend.clone(), store.clone());

        Ok(SessionClient {
            inner: Arc::new(Inner {
                config,
                backend,
                store,
                refresher,
                fetch,
                guard,
                lifecycle,
            }),
        })
    }
}
