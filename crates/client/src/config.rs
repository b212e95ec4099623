//! Client configuration
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (TOML or YAML), then `SESSIONGATE_*` environment variables. Nested keys use
//! a double underscore, e.g. `SESSIONGATE_ENDPOINTS__REFRESH=/auth/refresh-token`.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SESSIONGATE";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,

    /// Per-request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Whether `evaluate()` checks an existing credential against the guard endpoint
    pub validate_on_evaluate: bool,

    /// Backend endpoint paths
    pub endpoints: EndpointPaths,
}

/// Backend endpoint paths, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub guard: String,
    pub register: String,
    pub verify: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 20,
            user_agent: concat!("sessiongate/", env!("CARGO_PKG_VERSION")).to_string(),
            validate_on_evaluate: true,
            endpoints: EndpointPaths::default(),
        }
    }
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            refresh: "/refresh-token".to_string(),
            logout: "/logout".to_string(),
            guard: "/guard".to_string(),
            register: "/register".to_string(),
            verify: "/verify-token".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a default configuration pointing at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        Self::load(Some(path.as_ref()))
    }

    /// Load configuration from defaults and environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable fails to parse
    pub fn from_env() -> Result<Self, ClientError> {
        Self::load(None)
    }

    /// Load configuration from an optional file plus the environment
    ///
    /// # Errors
    ///
    /// Returns an error if any source cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` for an unparseable base URL or a
    /// relative endpoint path that does not start with `/`
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Configuration(format!("base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }

        let paths = [
            ("login", &self.endpoints.login),
            ("refresh", &self.endpoints.refresh),
            ("logout", &self.endpoints.logout),
            ("guard", &self.endpoints.guard),
            ("register", &self.endpoints.register),
            ("verify", &self.endpoints.verify),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                return Err(ClientError::Configuration(format!(
                    "endpoints.{name} must start with '/', got {path:?}"
                )));
            }
        }

        Ok(())
    }

    /// Request timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.endpoints.refresh, "/refresh-token");
        assert_eq!(config.timeout(), Some(Duration::from_secs(20)));
        assert!(config.validate_on_evaluate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let config = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClientConfig::with_base_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));

        let config = ClientConfig::with_base_url("ftp://example.com");
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));

        let mut config = ClientConfig::default();
        config.endpoints.guard = "guard".to_string();
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_file_merges_with_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "base_url = \"https://api.example.com\"\nvalidate_on_evaluate = false\n\n[endpoints]\nrefresh = \"/auth/refresh-token\""
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert!(!config.validate_on_evaluate);
        assert_eq!(config.endpoints.refresh, "/auth/refresh-token");
        assert_eq!(config.endpoints.login, "/login");
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn test_from_file_missing_file() {
        let result = ClientConfig::from_file("/nonexistent/sessiongate.toml");
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
