//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `MATTYS_API_URL` - Backend API base URL (default: `http://localhost:8000/api`)
//! - `MATTYS_DATA_DIR` - Directory for persisted state (default: `.mattys`)
//! - `MATTYS_HTTP_TIMEOUT_SECS` - HTTP request timeout in seconds (default: 10)
//! - `SENTRY_DSN` - Sentry DSN for error tracking
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_DATA_DIR: &str = ".mattys";
const DEFAULT_HTTP_TIMEOUT_SECS: &str = "10";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL, always ending in `/`.
    pub api_url: Url,
    /// Directory holding the file-backed key-value store.
    pub data_dir: PathBuf,
    /// Timeout applied to every backend request.
    pub http_timeout: Duration,
    /// Sentry DSN (optional).
    pub sentry_dsn: Option<String>,
    /// Sentry environment (optional).
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Loads a `.env` file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_url = parse_base_url(&env_or_default("MATTYS_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("MATTYS_API_URL".to_string(), e))?;

        let http_timeout = env_or_default("MATTYS_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MATTYS_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })
            .and_then(|secs| {
                if secs == 0 {
                    Err(ConfigError::InvalidEnvVar(
                        "MATTYS_HTTP_TIMEOUT_SECS".to_string(),
                        "must be greater than zero".to_string(),
                    ))
                } else {
                    Ok(Duration::from_secs(secs))
                }
            })?;

        Ok(Self {
            api_url,
            data_dir: PathBuf::from(env_or_default("MATTYS_DATA_DIR", DEFAULT_DATA_DIR)),
            http_timeout,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Parse a base URL, adding a trailing slash so relative joins keep the path.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("not a base URL".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
