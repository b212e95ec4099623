//! Session client: authenticated requests with single-flight token refresh
//!
//! The access token lives only in process memory ([`TokenStore`]). When a
//! request comes back 401 the [`RefreshCoordinator`] trades the HTTP-only
//! refresh cookie for a new token, collapsing concurrent refreshes into one
//! exchange, and [`AuthenticatedFetch`] replays the request exactly once.
//! [`SessionGuard`] decides whether a protected view may render.
//!
//! ```no_run
//! use sessiongate_client::{Credentials, Method, SessionClient, SessionState};
//!
//! # async fn run() -> Result<(), sessiongate_client::ClientError> {
//! let client = SessionClient::new("http://localhost:8000")?;
//! client.login(&Credentials::new("ana@example.com", "correct horse")).await?;
//!
//! let response = client
//!     .fetch_authenticated(client.request(Method::GET, "/microservices"))
//!     .await?;
//! println!("{}", response.status());
//!
//! if client.evaluate().await == SessionState::Unauthenticated {
//!     println!("please log in");
//! }
//! client.logout().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod lifecycle;
pub mod refresh;
pub mod token_store;
pub mod types;

pub use backend::Backend;
pub use client::{SessionClient, SessionClientBuilder};
pub use config::{ClientConfig, EndpointPaths};
pub use error::ClientError;
pub use fetch::{AuthenticatedFetch, FetchDisposition, RequestAttempt};
pub use guard::{SessionGuard, SessionState};
pub use lifecycle::{Credentials, Registration, SessionLifecycle};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use token_store::{AccessCredential, TokenStore};

// Re-exported so callers can build requests without a direct reqwest dependency
pub use reqwest::{Method, StatusCode};
