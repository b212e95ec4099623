//! Wire types for the backend's auth endpoints

use serde::{Deserialize, Serialize};

/// Body returned by `/login` and `/refresh-token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
}

impl AccessTokenResponse {
    /// The token, if present and non-empty
    pub fn into_token(self) -> Option<String> {
        self.access_token.filter(|token| !token.is_empty())
    }
}

/// Body sent to `/login`
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body sent to `/register`
#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}
