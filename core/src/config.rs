//! Client configuration.
//!
//! The transport defaults apply unless a timeout is set explicitly. The
//! environment can override the base URL (`FUSIONAPI_BASE_URL`) and the
//! request timeout in whole seconds (`FUSIONAPI_TIMEOUT_SECS`).

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://fusionapi.dev/";

pub const BASE_URL_ENV: &str = "FUSIONAPI_BASE_URL";
pub const TIMEOUT_ENV: &str = "FUSIONAPI_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            if base_url.trim().is_empty() {
                return Err(ApiError::Config(format!("{BASE_URL_ENV} is empty")));
            }
            config.base_url = base_url.trim().to_string();
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ApiError::Config(format!("{TIMEOUT_ENV} must be whole seconds, got {secs:?}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// The base URL with exactly one trailing slash.
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.base_url)
    }
}

pub(crate) fn normalize_base_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}
