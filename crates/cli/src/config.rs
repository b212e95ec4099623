//! CLI configuration utilities

use anyhow::{Context, Result};
use sessiongate_client::{ClientConfig, SessionClient};
use std::path::{Path, PathBuf};

/// Global options that shape the client
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

impl Settings {
    /// Resolve the effective client configuration
    ///
    /// An explicit `--config` must exist; otherwise the per-user default file is
    /// used when present. Environment variables and `--base-url` are applied on top.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let path = match &self.config_path {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|path| path.exists()),
        };

        let mut config = ClientConfig::load(path.as_deref())
            .with_context(|| match &path {
                Some(path) => format!("loading {}", path.display()),
                None => "loading configuration from environment".to_string(),
            })?;

        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        Ok(config)
    }

    /// Build a session client from the effective configuration
    pub fn client(&self) -> Result<SessionClient> {
        let config = self.client_config()?;
        SessionClient::builder()
            .config(config)
            .build()
            .context("building session client")
    }
}

/// `<config dir>/sessiongate/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sessiongate").join("config.toml"))
}

/// Write a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P, force: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&ClientConfig::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Render a configuration for display
pub fn render(config: &ClientConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        generate_default_config(&path, false).unwrap();
        let written = ClientConfig::from_file(&path).unwrap();
        assert_eq!(written.endpoints.refresh, "/refresh-token");

        assert!(generate_default_config(&path, false).is_err());
        assert!(generate_default_config(&path, true).is_ok());
    }

    #[test]
    fn test_base_url_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://file.example:9000\"\n").unwrap();

        let settings = Settings {
            config_path: Some(path),
            base_url: Some("https://flag.example".to_string()),
        };
        let config = settings.client_config().unwrap();
        assert_eq!(config.base_url, "https://flag.example");
    }
}
