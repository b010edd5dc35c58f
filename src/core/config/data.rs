use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::io::ConfigError;
use crate::core::constants::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use crate::core::geolocation::{clamp_timeout, StaticLocation, DEFAULT_LOOKUP_TIMEOUT};
use crate::utils::url::is_http_url;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Fixed coordinates attached to user turns when configured.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeolocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    #[serde(default)]
    pub accuracy: f64,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Where cases are stored. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeolocationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            data_dir: None,
            geolocation: None,
        }
    }
}

impl Config {
    pub fn location_provider(&self) -> Option<StaticLocation> {
        self.geolocation.as_ref().map(|geo| StaticLocation {
            latitude: geo.latitude,
            longitude: geo.longitude,
            accuracy: geo.accuracy,
        })
    }

    pub fn geolocation_timeout(&self) -> Duration {
        self.geolocation
            .as_ref()
            .and_then(|geo| geo.timeout_secs)
            .map(|secs| clamp_timeout(Duration::from_secs(secs)))
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT)
    }
}

/// Credential and endpoint resolved at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    pub fn from_env(config: &Config) -> Result<Self, ConfigError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` for environment variables. The API key is
    /// required; `OPENAI_BASE_URL` overrides the configured base URL.
    pub fn resolve<F>(config: &Config, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))?;

        let base_url = lookup(BASE_URL_ENV)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| config.base_url.clone());

        if !is_http_url(&base_url) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        Ok(Self { api_key, base_url })
    }
}

/// Shorten paths under `$HOME` to `~/...` for display.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            if let Ok(relative) = path.strip_prefix(PathBuf::from(home)) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
