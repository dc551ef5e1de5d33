//! HTTP transport for OGC web service clients.
//!
//! Supports:
//! - GET with query-string parameters and POST with an XML body
//! - HTTP basic authentication, extra headers and cookies per request
//! - Optional per-request timeouts (none by default)

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::HttpConfig;
pub use error::{HttpError, HttpResult};
pub use transport::{HttpTransport, Transport};
pub use types::{Credentials, FetchRequest, HttpMethod};
