use std::{env, time::Duration};
use thiserror::Error;

pub const API_URL_VAR: &str = "SCHEDULER_API_URL";
pub const WRITE_DEBOUNCE_VAR: &str = "SCHEDULER_WRITE_DEBOUNCE_MS";
pub const REQUEST_TIMEOUT_VAR: &str = "SCHEDULER_REQUEST_TIMEOUT_MS";

const DEFAULT_WRITE_DEBOUNCE_MS: u64 = 800;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("remote store URL is not configured; set {API_URL_VAR}")]
    MissingApiUrl,
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Client-side settings for talking to the remote row store.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Option<String>,
    pub write_debounce: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            write_debounce: Duration::from_millis(DEFAULT_WRITE_DEBOUNCE_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup(API_URL_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            api_url,
            write_debounce: millis_var(&lookup, WRITE_DEBOUNCE_VAR, DEFAULT_WRITE_DEBOUNCE_MS)?,
            request_timeout: millis_var(&lookup, REQUEST_TIMEOUT_VAR, DEFAULT_REQUEST_TIMEOUT_MS)?,
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }

    pub fn api_url(&self) -> Result<&str, ConfigError> {
        self.api_url.as_deref().ok_or(ConfigError::MissingApiUrl)
    }
}

fn millis_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        None => Ok(Duration::from_millis(default)),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
