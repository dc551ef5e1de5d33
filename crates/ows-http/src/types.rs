//! HTTP request types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP methods used by OGC KVP and XML bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP basic authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One transport call. Everything the call needs travels with it; the
/// transport keeps no per-session state.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Query-string pairs appended to `url`.
    pub query: Vec<(String, String)>,
    /// Request body, sent only with POST.
    pub body: Option<Vec<u8>>,
    pub credentials: Option<Credentials>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    /// `None` blocks until the server answers.
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            query: Vec::new(),
            body: None,
            credentials: None,
            headers: Vec::new(),
            cookies: Vec::new(),
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// `Cookie` header value, or `None` when no cookies are set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_carries_body() {
        let request = FetchRequest::post("http://example.com/wps", "<x/>");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(b"<x/>".as_slice()));
    }

    #[test]
    fn test_get_builder() {
        let request = FetchRequest::get("http://example.com/wps")
            .query([("service", "WPS"), ("request", "GetCapabilities")])
            .header("Accept", "text/xml")
            .timeout(Duration::from_secs(5));
        assert_eq!(request.query.len(), 2);
        assert!(request.has_header("accept"));
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_cookie_header() {
        let request = FetchRequest::get("http://x").cookie("a", "1").cookie("b", "2");
        assert_eq!(request.cookie_header().as_deref(), Some("a=1; b=2"));
        assert_eq!(FetchRequest::get("http://x").cookie_header(), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }
}
