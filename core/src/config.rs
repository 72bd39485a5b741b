//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TOKEN_FILE_NAME: &str = "access_token";
const APP_DIR_NAME: &str = "todo-app";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the API prefix, e.g. `http://host:8000/api/v1`.
    pub api_base_url: String,
    /// File holding the persisted bearer token.
    pub token_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token_path: default_token_path(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load from `TODO_API_URL`, `TODO_TOKEN_FILE` and
    /// `TODO_HTTP_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("TODO_API_URL") {
            config.api_base_url = url;
        }
        if let Some(path) = lookup("TODO_TOKEN_FILE") {
            config.token_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("TODO_HTTP_TIMEOUT_SECS") {
            config.request_timeout = parse_timeout(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api base url must start with http:// or https://, got {url:?}"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("timeout must be a whole number of seconds, got {raw:?}"))
    })?;
    if secs == 0 {
        return Err(ConfigError::ValidationError(
            "request timeout must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// `<config dir>/todo-app/access_token`, or the working directory when the
/// platform has no config dir.
pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
        .join(TOKEN_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.token_path.ends_with("todo-app/access_token"));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TODO_API_URL", "https://todo.example.com/api/v1"),
            ("TODO_TOKEN_FILE", "/tmp/tok"),
            ("TODO_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://todo.example.com/api/v1");
        assert_eq!(config.token_path, PathBuf::from("/tmp/tok"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        assert!(ClientConfig::from_lookup(lookup(&[("TODO_HTTP_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("TODO_HTTP_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("TODO_API_URL", "localhost:8000")])).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
