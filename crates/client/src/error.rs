//! Client error types

use crate::refresh::RefreshFailure;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login was rejected by the backend
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The refresh cookie was rejected; the user must log in again
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Transport-level failure; credential status is unknown
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A protected call still returned 401 after its single retry
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Input rejected before reaching the network
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A 2xx login or refresh response carried no access token
    #[error("Response did not contain an access token")]
    MissingAccessToken,
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the caller has to send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialization(err.to_string())
        } else if err.is_builder() {
            Self::Configuration(err.to_string())
        } else {
            Self::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<RefreshFailure> for ClientError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::ExpiredOrRevoked { .. } | RefreshFailure::Superseded => {
                Self::SessionExpired
            }
            RefreshFailure::Network(reason) => Self::NetworkUnavailable(reason),
            RefreshFailure::Server { status } => Self::ServerError {
                status,
                message: "refresh endpoint failed".to_string(),
            },
            RefreshFailure::InvalidResponse(_) => Self::MissingAccessToken,
        }
    }
}
