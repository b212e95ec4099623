//! Shared HTTP transport to the backend

use crate::config::{ClientConfig, EndpointPaths};
use crate::error::ClientError;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder};
use std::sync::Arc;

/// HTTP client bound to one backend
///
/// Cloning is cheap and every clone shares the same connection pool and
/// cookie jar, so a refresh cookie set by `/login` is sent back on
/// `/refresh-token` no matter which component issues the request.
#[derive(Clone)]
pub struct Backend {
    client: Client,
    base_url: Arc<str>,
    endpoints: Arc<EndpointPaths>,
}

impl Backend {
    /// Build the transport from a validated configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut builder = ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .cookie_store(true);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url),
            endpoints: Arc::new(config.endpoints.clone()),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Configured endpoint paths
    pub fn endpoints(&self) -> &EndpointPaths {
        &self.endpoints
    }

    /// Absolute URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder without authentication
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = Backend::new(&ClientConfig::with_base_url("http://localhost:8000/")).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/guard"), "http://localhost:8000/guard");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = Backend::new(&ClientConfig::with_base_url("localhost"));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
