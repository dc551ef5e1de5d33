//! Client configuration.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ows_http::{Credentials, HttpConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WpsError, WpsResult};
use crate::request::WPS_VERSION;

/// Settings for a [`WebProcessingService`](crate::WebProcessingService).
///
/// ```yaml
/// url: https://wps.example.com/wps
/// poll_interval_secs: 10
/// http:
///   timeout_secs: 120
///   credentials:
///     username: alice
///     password: secret
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub url: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub http: HttpConfig,

    /// Pause between status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_version() -> String {
    WPS_VERSION.to_string()
}

fn default_poll_interval() -> u64 {
    5
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version: default_version(),
            http: HttpConfig::default(),
            poll_interval_secs: default_poll_interval(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> WpsResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| WpsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> WpsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            WpsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded client configuration");
        Self::from_yaml_str(&contents)
    }

    /// Load from environment variables.
    ///
    /// `WPS_URL` is required. `WPS_VERSION`, `WPS_POLL_INTERVAL_SECS`,
    /// `WPS_HTTP_TIMEOUT_SECS`, `WPS_USERNAME` and `WPS_PASSWORD` are
    /// optional; the HTTP settings fall back to the `OWS_*` variables.
    pub fn from_env() -> WpsResult<Self> {
        let url = env::var("WPS_URL")
            .map_err(|_| WpsError::Config("WPS_URL is not set".to_string()))?;

        let mut http = HttpConfig::from_env();
        if let Some(timeout) = parse_var("WPS_HTTP_TIMEOUT_SECS") {
            http.timeout_secs = Some(timeout);
        }
        if let Ok(username) = env::var("WPS_USERNAME") {
            http.credentials = Some(Credentials {
                username,
                password: env::var("WPS_PASSWORD").ok(),
            });
        }

        let config = Self {
            url,
            version: env::var("WPS_VERSION").unwrap_or_else(|_| default_version()),
            http,
            poll_interval_secs: parse_var("WPS_POLL_INTERVAL_SECS").unwrap_or_else(default_poll_interval),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    fn validate(&self) -> WpsResult<()> {
        url::Url::parse(&self.url)
            .map_err(|e| WpsError::Config(format!("Invalid service URL '{}': {}", self.url, e)))?;
        if self.version != WPS_VERSION {
            return Err(WpsError::Config(format!(
                "Unsupported WPS version '{}', only {} is implemented",
                self.version, WPS_VERSION
            )));
        }
        Ok(())
    }
}

fn parse_var(name: &str) -> Option<u64> {
    let value = env::var(name).ok()?;
    value
        .trim()
        .parse()
        .map_err(|_| warn!(%value, "Ignoring invalid {}", name))
        .ok()
}
