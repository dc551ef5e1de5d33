//! Namespace URIs and the prefix table used when writing OGC documents.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

pub const WPS_1_0_0: &str = "http://www.opengis.net/wps/1.0.0";
pub const OWS_1_1: &str = "http://www.opengis.net/ows/1.1";
/// OWS 1.0 namespace, still used by some servers for exception reports.
pub const OWS_1_0: &str = "http://www.opengis.net/ows";
pub const XLINK: &str = "http://www.w3.org/1999/xlink";
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const GML: &str = "http://www.opengis.net/gml";
pub const WFS: &str = "http://www.opengis.net/wfs";
pub const OGC: &str = "http://www.opengis.net/ogc";

static OGC_NAMESPACES: Lazy<Namespaces> = Lazy::new(|| {
    Namespaces::new([
        ("wps", WPS_1_0_0),
        ("ows", OWS_1_1),
        ("xlink", XLINK),
        ("xsi", XSI),
        ("xml", XML),
        ("gml", GML),
        ("wfs", WFS),
        ("ogc", OGC),
    ])
});

/// Immutable prefix → namespace URI table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Namespaces {
    by_prefix: BTreeMap<String, String>,
}

impl Namespaces {
    /// Build a table from (prefix, uri) pairs. Later duplicates of a prefix win.
    pub fn new<I, P, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        Self {
            by_prefix: entries
                .into_iter()
                .map(|(prefix, uri)| (prefix.into(), uri.into()))
                .collect(),
        }
    }

    /// The table shared by every WPS document this workspace writes.
    pub fn ogc() -> &'static Namespaces {
        &OGC_NAMESPACES
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    /// First prefix (in prefix order) bound to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.by_prefix
            .iter()
            .find(|(_, bound)| bound.as_str() == uri)
            .map(|(prefix, _)| prefix.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_prefix
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}

/// True for both OWS 1.0 and OWS 1.1 namespaces.
pub fn is_ows(uri: &str) -> bool {
    uri == OWS_1_1 || uri == OWS_1_0
}
