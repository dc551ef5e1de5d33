//! HTTP configuration

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Credentials, FetchRequest};

/// Per-call defaults applied to every request a client issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,

    pub credentials: Option<Credentials>,

    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,

    pub cookies: BTreeMap<String, String>,

    pub user_agent: Option<String>,
}

impl HttpConfig {
    /// Load from environment variables:
    /// `OWS_HTTP_TIMEOUT_SECS`, `OWS_USERNAME`, `OWS_PASSWORD`, `OWS_USER_AGENT`.
    pub fn from_env() -> Self {
        let timeout_secs = env::var("OWS_HTTP_TIMEOUT_SECS").ok().and_then(|v| {
            v.parse()
                .map_err(|_| warn!(value = %v, "Ignoring invalid OWS_HTTP_TIMEOUT_SECS"))
                .ok()
        });

        let credentials = env::var("OWS_USERNAME").ok().map(|username| Credentials {
            username,
            password: env::var("OWS_PASSWORD").ok(),
        });

        Self {
            timeout_secs,
            credentials,
            user_agent: env::var("OWS_USER_AGENT").ok(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Fill in whatever the request does not already set.
    pub fn apply(&self, mut request: FetchRequest) -> FetchRequest {
        if request.credentials.is_none() {
            request.credentials = self.credentials.clone();
        }
        if request.timeout.is_none() {
            request.timeout = self.timeout();
        }
        for (name, value) in &self.headers {
            if !request.has_header(name) {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        for (name, value) in &self.cookies {
            if !request.cookies.iter().any(|(n, _)| n == name) {
                request.cookies.push((name.clone(), value.clone()));
            }
        }
        request
    }
}
