//! WPS client error types.

use ows_common::{OwsError, OwsException};
use ows_http::HttpError;
use thiserror::Error;

use crate::literal::LiteralCastError;

/// Result type alias using WpsError.
pub type WpsResult<T> = Result<T, WpsError>;

/// Server-reported exceptions are stored on the execution as
/// [`ExecutionError`](crate::ExecutionError) entries, not returned here.
#[derive(Debug, Error)]
pub enum WpsError {
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{message} (status: {status}){}", describe_errors(.errors))]
    State {
        status: String,
        message: String,
        errors: Vec<OwsException>,
    },

    #[error("Invalid literal value: {0}")]
    Value(#[from] LiteralCastError),

    #[error("XML error: {0}")]
    Xml(#[from] OwsError),

    /// A describe/capabilities call got a document of the wrong kind.
    #[error("Expected {expected} document, got <{found}>")]
    UnexpectedDocument { expected: String, found: String },

    /// A describe/capabilities call was answered with an exception report.
    #[error("Service exception: {}", describe_errors(.0))]
    ServiceException(Vec<OwsException>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn describe_errors(errors: &[OwsException]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("; errors: {}", listed.join(", "))
}
