//! HTTP error types

/// Result type alias using HttpError.
pub type HttpResult<T> = Result<T, HttpError>;

/// Transport-level failures.
///
/// HTTP error statuses are not errors here: OGC services routinely report
/// failures as exception documents, so the body is returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
