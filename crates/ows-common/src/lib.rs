//! Common types and utilities shared by the OGC web service clients.

pub mod bbox;
pub mod error;
pub mod exception;
pub mod namespaces;
pub mod xml;

pub use bbox::BoundingBox;
pub use error::{OwsError, OwsResult};
pub use exception::{is_exception_report, parse_exception_report, OwsException};
pub use namespaces::Namespaces;
pub use xml::{parse, parse_fragment, Attribute, Element, Node, QName};
