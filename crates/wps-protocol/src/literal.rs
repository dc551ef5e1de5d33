//! Literal data types and value casting.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalar type a literal input or output is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LiteralType {
    Boolean,
    Integer,
    Float,
    #[default]
    String,
}

impl LiteralType {
    /// Map a WPS data type reference onto a scalar type.
    ///
    /// Accepts bare names ("integer"), prefixed names ("xs:double"), XML
    /// Schema URLs (".../xmlschema-2/#boolean") and OGC URNs
    /// ("urn:ogc:def:dataType:OGC:1.1:float"). Unknown types read as strings.
    pub fn from_data_type(data_type: &str) -> Self {
        let name = data_type
            .rsplit(|c: char| c == '#' || c == ':' || c == '/')
            .next()
            .unwrap_or(data_type)
            .trim()
            .to_ascii_lowercase();

        match name.as_str() {
            "boolean" | "bool" => LiteralType::Boolean,
            "integer" | "int" | "long" | "short" | "byte" | "positiveinteger"
            | "nonnegativeinteger" | "negativeinteger" | "nonpositiveinteger"
            | "unsignedint" | "unsignedlong" | "unsignedshort" => LiteralType::Integer,
            "float" | "double" | "decimal" => LiteralType::Float,
            _ => LiteralType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiteralType::Boolean => "boolean",
            LiteralType::Integer => "integer",
            LiteralType::Float => "float",
            LiteralType::String => "string",
        }
    }

    /// Cast raw text to this type. Numeric and boolean casts ignore
    /// surrounding whitespace; strings are kept as-is.
    pub fn cast(&self, raw: &str) -> Result<LiteralValue, LiteralCastError> {
        let trimmed = raw.trim();
        let failed = || LiteralCastError {
            value: raw.to_string(),
            data_type: *self,
        };

        match self {
            LiteralType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(LiteralValue::Boolean(true)),
                "false" | "0" => Ok(LiteralValue::Boolean(false)),
                _ => Err(failed()),
            },
            LiteralType::Integer => trimmed
                .parse()
                .map(LiteralValue::Integer)
                .map_err(|_| failed()),
            LiteralType::Float => trimmed
                .parse()
                .map(LiteralValue::Float)
                .map_err(|_| failed()),
            LiteralType::String => Ok(LiteralValue::String(raw.to_string())),
        }
    }
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A literal value cast to its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl LiteralValue {
    pub fn data_type(&self) -> LiteralType {
        match self {
            LiteralValue::Boolean(_) => LiteralType::Boolean,
            LiteralValue::Integer(_) => LiteralType::Integer,
            LiteralValue::Float(_) => LiteralType::Float,
            LiteralValue::String(_) => LiteralType::String,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LiteralValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiteralValue::Integer(v) => Some(*v as f64),
            LiteralValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Boolean(v) => write!(f, "{}", v),
            LiteralValue::Integer(v) => write!(f, "{}", v),
            LiteralValue::Float(v) => write!(f, "{}", v),
            LiteralValue::String(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("'{value}' is not a valid {data_type}")]
pub struct LiteralCastError {
    pub value: String,
    pub data_type: LiteralType,
}
