//! Login, logout and registration

use crate::backend::Backend;
use crate::error::ClientError;
use crate::token_store::{AccessCredential, TokenStore};
use crate::types::{AccessTokenResponse, LoginRequest, RegisterRequest};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Method, Response};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Minimum password length accepted by the backend
pub const MIN_PASSWORD_LEN: usize = 8;

fn validate_email(email: &str) -> Result<(), ClientError> {
    if email.is_empty() || !email.contains('@') || !email.contains('.') {
        return Err(ClientError::Validation("Bad email or password".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ClientError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Identifier and secret exchanged for an access token
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject input the backend would refuse anyway
    pub fn validate(&self) -> Result<(), ClientError> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// New account details
#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("Incorrect parameters".to_string()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The state-changing entry points of a session
pub struct SessionLifecycle {
    backend: Backend,
    store: Arc<TokenStore>,
}

impl SessionLifecycle {
    pub fn new(backend: Backend, store: Arc<TokenStore>) -> Self {
        Self { backend, store }
    }

    /// Exchange credentials for an access token; the server also sets the refresh cookie
    ///
    /// The store is only written on success.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `InvalidCredentials` for a 4xx,
    /// `NetworkUnavailable` for transport failures, `MissingAccessToken` for a
    /// 2xx without a token.
    pub async fn login(&self, credentials: &Credentials) -> Result<AccessCredential, ClientError> {
        credentials.validate()?;

        let response = self
            .backend
            .request(Method::POST, &self.backend.endpoints().login)
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            warn!(email = %credentials.email, status = status.as_u16(), "Login rejected");
            return Err(if status.is_client_error() {
                ClientError::InvalidCredentials(message)
            } else {
                ClientError::from_status(status, message)
            });
        }

        let token = response
            .json::<AccessTokenResponse>()
            .await?
            .into_token()
            .ok_or(ClientError::MissingAccessToken)?;
        let credential = AccessCredential::new(token);

        self.store.set(Some(credential.clone()));
        info!(email = %credentials.email, "Logged in");
        Ok(credential)
    }

    /// Drop the local session now, then tell the server to clear the refresh cookie
    ///
    /// The store is cleared before this returns and the server notification is
    /// already on its way on a spawned task. The returned future resolves once
    /// the server answered; dropping it does not cancel the notification, and
    /// it never fails. Outside a Tokio runtime the notification is only sent
    /// when the future is awaited.
    pub fn logout(&self) -> BoxFuture<'static, ()> {
        self.store.clear();
        info!("Logged out locally");

        let request = self
            .backend
            .request(Method::POST, &self.backend.endpoints().logout);
        let notify = async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Server acknowledged logout");
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), "Server logout failed, ignoring");
                }
                Err(e) => warn!(error = %e, "Server logout unreachable, ignoring"),
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime.spawn(notify).map(|_| ()).boxed(),
            Err(_) => notify.boxed(),
        }
    }

    /// Create an account; does not log in
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, otherwise the status mapping of
    /// [`ClientError::from_status`].
    pub async fn register(&self, registration: &Registration) -> Result<Value, ClientError> {
        registration.validate()?;

        let response = self
            .backend
            .request(Method::POST, &self.backend.endpoints().register)
            .json(&RegisterRequest {
                name: &registration.name,
                email: &registration.email,
                password: &registration.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::from_status(status, message));
        }

        let body = response.text().await?;
        info!(email = %registration.email, "Registered account");
        if body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    response.text().await.unwrap_or_else(|_| status.to_string())
}
