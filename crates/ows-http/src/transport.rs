//! Transport trait and the blocking reqwest implementation.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header;
use tracing::{debug, instrument, warn};

use crate::config::HttpConfig;
use crate::error::{HttpError, HttpResult};
use crate::types::{FetchRequest, HttpMethod};

/// Performs one HTTP exchange and returns the raw response body.
///
/// Implementations must be stateless per call so a single transport can
/// serve several executions from different threads.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> HttpResult<Bytes>;
}

/// Blocking HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport. Only the user agent is taken from `config`; the
    /// remaining settings are applied per request.
    pub fn new(config: &HttpConfig) -> HttpResult<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("ows-client/{}", env!("CARGO_PKG_VERSION")));

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    fn fetch(&self, request: &FetchRequest) -> HttpResult<Bytes> {
        url::Url::parse(&request.url).map_err(|e| HttpError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header(header::CONTENT_TYPE, "text/xml")
                .body(request.body.clone().unwrap_or_default()),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_deref());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = request.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(|source| network_error(&request.url, source))?;

        let status = response.status();
        if !status.is_success() {
            // Exception reports often arrive with 4xx/5xx; the parser decides.
            warn!(status = status.as_u16(), "Server returned an HTTP error status");
        }

        let body = response
            .bytes()
            .map_err(|source| network_error(&request.url, source))?;
        debug!(status = status.as_u16(), bytes = body.len(), "Received response");
        Ok(body)
    }
}

fn network_error(url: &str, source: reqwest::Error) -> HttpError {
    if source.is_connect() {
        HttpError::Connection {
            url: url.to_string(),
            message: source.to_string(),
        }
    } else {
        HttpError::Request {
            url: url.to_string(),
            source,
        }
    }
}
