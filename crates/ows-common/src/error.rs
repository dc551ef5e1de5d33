//! Error types for the OWS common layer.

use thiserror::Error;

/// Result type alias using OwsError.
pub type OwsResult<T> = Result<T, OwsError>;

/// Errors raised while reading or writing OWS documents.
#[derive(Debug, Error)]
pub enum OwsError {
    // === XML Errors ===
    #[error("Malformed XML at byte {position}: {message}")]
    MalformedXml { position: usize, message: String },

    #[error("XML serialization failed: {0}")]
    Serialize(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    // === Bounding Box Errors ===
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid number in bounding box: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_has_position() {
        let err = OwsError::MalformedXml {
            position: 42,
            message: "unexpected end".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed XML at byte 42: unexpected end");
    }

    #[test]
    fn test_missing_element_display() {
        let err = OwsError::MissingElement("ows:Identifier".to_string());
        assert!(err.to_string().contains("ows:Identifier"));
    }
}
