//! Process outputs and their retrieval.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ows_common::namespaces::XLINK;
use ows_common::{BoundingBox, Element};
use ows_http::{FetchRequest, HttpConfig, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::WpsResult;
use crate::input::canonical_markup;
use crate::literal::{LiteralType, LiteralValue};

/// Location of an output the server stored for later download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputReference {
    pub href: String,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub schema: Option<String>,
}

impl OutputReference {
    /// Read a `wps:Reference`. Servers use both `href` and `xlink:href`.
    pub fn from_element(element: &Element) -> Option<Self> {
        let href = element
            .attr("href")
            .or_else(|| element.attr_ns("href", XLINK))?
            .trim()
            .to_string();
        Some(Self {
            href,
            mime_type: element.attr("mimeType").map(str::to_string),
            encoding: element.attr("encoding").map(str::to_string),
            schema: element.attr("schema").map(str::to_string),
        })
    }
}

/// Complex data embedded in the response document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexPayload {
    /// Serialized markup for XML content, otherwise the text.
    pub payload: String,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputData {
    Reference(OutputReference),
    Literal(LiteralValue),
    Complex(ComplexPayload),
    BoundingBox(BoundingBox),
}

/// An output (or echoed input) of an execute response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputResult {
    pub identifier: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    /// Literal `dataType`, as written or as declared by the description.
    pub data_type: Option<String>,
    pub uom: Option<String>,
    pub data: Option<OutputData>,
}

impl OutputResult {
    /// Parse a `wps:Output` or `wps:Input` element of an execute response.
    ///
    /// Literal values are cast with the `dataType` attribute when present,
    /// otherwise with `declared`, otherwise kept as strings.
    pub fn from_element(element: &Element, declared: Option<LiteralType>) -> WpsResult<Self> {
        let identifier = element.child_text("Identifier").unwrap_or_default();
        let mut result = Self {
            identifier,
            title: element.child_text("Title"),
            abstract_text: element.child_text("Abstract"),
            data_type: None,
            uom: None,
            data: None,
        };

        if let Some(reference) = element.child_local("Reference") {
            result.data = OutputReference::from_element(reference).map(OutputData::Reference);
            return Ok(result);
        }

        let Some(data) = element.child_local("Data").and_then(Element::first_element) else {
            return Ok(result);
        };

        match data.local_name() {
            "LiteralData" => {
                let attr_type = data.attr("dataType").map(str::to_string);
                let literal_type = attr_type
                    .as_deref()
                    .map(LiteralType::from_data_type)
                    .or(declared)
                    .unwrap_or_default();
                result.data = Some(OutputData::Literal(literal_type.cast(&data.text())?));
                result.data_type = attr_type.or_else(|| declared.map(|t| t.as_str().to_string()));
                result.uom = data.attr("uom").map(str::to_string);
            }
            "ComplexData" => {
                let payload = if data.has_elements() {
                    canonical_markup(data.children.clone())?
                } else {
                    data.text()
                };
                result.data = Some(OutputData::Complex(ComplexPayload {
                    payload,
                    mime_type: data.attr("mimeType").map(str::to_string),
                    encoding: data.attr("encoding").map(str::to_string),
                    schema: data.attr("schema").map(str::to_string),
                }));
            }
            "BoundingBoxData" => {
                result.data = Some(OutputData::BoundingBox(BoundingBox::from_element(data)?));
            }
            other => debug!(identifier = %result.identifier, element = other, "Ignoring unknown output data"),
        }
        Ok(result)
    }

    pub fn reference(&self) -> Option<&OutputReference> {
        match &self.data {
            Some(OutputData::Reference(reference)) => Some(reference),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&LiteralValue> {
        match &self.data {
            Some(OutputData::Literal(value)) => Some(value),
            _ => None,
        }
    }
}

/// What `get_output` produced for one output.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedOutput {
    /// Data that came embedded in the response.
    Inline { identifier: String, data: OutputData },
    /// A referenced output downloaded to disk.
    Written {
        identifier: String,
        path: PathBuf,
        bytes: u64,
    },
}

/// GET the referenced URL. The query string is passed as separate parameters.
#[instrument(skip(transport, http), fields(href = %reference.href))]
pub fn retrieve_data(
    reference: &OutputReference,
    transport: &dyn Transport,
    http: &HttpConfig,
) -> WpsResult<Bytes> {
    let request = get_request(&reference.href);
    Ok(transport.fetch(&http.apply(request))?)
}

/// GET request for `href` with its query string split into parameters. A
/// query that would not re-encode to the same text, such as a bare `?jobid`
/// or a signed URL with percent-escapes, stays in the URL untouched.
pub(crate) fn get_request(href: &str) -> FetchRequest {
    match url::Url::parse(href) {
        Ok(parsed) if parsed.query().is_some_and(|query| splits_cleanly(&parsed, query)) => {
            let query: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
            let mut base = parsed;
            base.set_query(None);
            FetchRequest::get(base.as_str()).query(query)
        }
        _ => FetchRequest::get(href),
    }
}

fn splits_cleanly(parsed: &url::Url, query: &str) -> bool {
    let reencoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parsed.query_pairs())
        .finish();
    reencoded == query
}

/// File name for a downloaded output: the first query parameter's value,
/// else the last path segment, else the output identifier.
pub fn derive_filename(href: &str, identifier: &str) -> String {
    let candidate = url::Url::parse(href).ok().and_then(|parsed| {
        let from_query = parsed
            .query_pairs()
            .next()
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
        from_query.or_else(|| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
                .filter(|segment| !segment.is_empty())
        })
    });

    let name = sanitize(candidate.as_deref().unwrap_or(identifier));
    if name.is_empty() {
        sanitize(identifier)
    } else {
        name
    }
}

/// Keep the last path component and replace characters that are awkward in
/// file names.
fn sanitize(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('.').to_string()
}

/// Where a downloaded output goes: into `destination` when it is a
/// directory, to `destination` itself otherwise, or to `filename` in the
/// working directory.
pub fn target_path(destination: Option<&Path>, filename: &str) -> PathBuf {
    match destination {
        Some(dir) if dir.is_dir() => dir.join(filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename),
    }
}

pub fn write_to_disk(path: &Path, data: &[u8]) -> WpsResult<u64> {
    fs::write(path, data)?;
    info!(path = %path.display(), bytes = data.len(), "Wrote output");
    Ok(data.len() as u64)
}
