//! Execute inputs and request fragments.

use std::fmt;
use std::sync::Arc;

use ows_common::namespaces::{GML, OGC, OWS_1_1, WFS, WPS_1_0_0, XLINK};
use ows_common::{parse_fragment, BoundingBox, Element, Namespaces, Node, OwsError};

use crate::error::{WpsError, WpsResult};
use crate::process::DataKind;

/// Something that renders its own `wps:Reference` or `wps:Data` element for
/// an execute request.
pub trait RequestFragment: fmt::Debug + Send + Sync {
    fn to_request_fragment(&self) -> Element;
}

/// Complex input given inline or by reference. Exactly one of `payload` and
/// `href` must be set.
///
/// Text payloads are kept exactly as given. Markup payloads are held in the
/// normalized form a parsed request yields: no XML declaration, no outer
/// whitespace, each top-level element declaring its own namespace prefixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexDataInput {
    pub payload: Option<String>,
    pub href: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub schema: Option<String>,
}

impl ComplexDataInput {
    pub fn inline(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(normalize_payload(payload.into())),
            ..Self::default()
        }
    }

    pub fn reference(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn validate(&self, identifier: &str) -> WpsResult<()> {
        match (&self.payload, &self.href) {
            (Some(_), Some(_)) => Err(WpsError::Validation(format!(
                "complex input '{}' has both an inline payload and a reference",
                identifier
            ))),
            (None, None) => Err(WpsError::Validation(format!(
                "complex input '{}' has neither an inline payload nor a reference",
                identifier
            ))),
            (None, Some(href)) if href.trim().is_empty() => Err(WpsError::Validation(format!(
                "complex input '{}' has an empty reference",
                identifier
            ))),
            (Some(payload), None) => match xml_body(payload) {
                Some(body) => parse_fragment(body).map(|_| ()).map_err(|e| {
                    WpsError::Validation(format!(
                        "complex input '{}' payload is not well-formed XML: {}",
                        identifier, e
                    ))
                }),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn set_format_attrs(&self, mut element: Element) -> Element {
        if let Some(mime_type) = &self.mime_type {
            element = element.with_attr("mimeType", mime_type.as_str());
        }
        if let Some(encoding) = &self.encoding {
            element = element.with_attr("encoding", encoding.as_str());
        }
        if let Some(schema) = &self.schema {
            element = element.with_attr("schema", schema.as_str());
        }
        element
    }

    fn to_element(&self) -> Element {
        if let Some(href) = &self.href {
            let reference = Element::new(WPS_1_0_0, "Reference").with_ns_attr(XLINK, "href", href.as_str());
            return self.set_format_attrs(reference);
        }

        let payload = self.payload.as_deref().unwrap_or_default();
        let mut complex = self.set_format_attrs(Element::new(WPS_1_0_0, "ComplexData"));
        match xml_body(payload).map(|body| (body, parse_fragment(body))) {
            Some((_, Ok(nodes))) => complex.children = nodes,
            Some((body, Err(_))) => complex = complex.with_raw(body),
            None => complex = complex.with_text(payload),
        }
        Element::new(WPS_1_0_0, "Data").with_child(complex)
    }

    fn from_reference(element: &Element) -> Self {
        Self {
            payload: None,
            href: element
                .attr_ns("href", XLINK)
                .or_else(|| element.attr("href"))
                .map(str::to_string),
            ..Self::formats_of(element)
        }
    }

    fn from_complex_data(element: &Element) -> WpsResult<Self> {
        let payload = if element.has_elements() {
            canonical_markup(element.children.clone())?
        } else {
            element.text()
        };
        Ok(Self {
            payload: Some(payload),
            ..Self::formats_of(element)
        })
    }

    fn formats_of(element: &Element) -> Self {
        Self {
            mime_type: element.attr("mimeType").map(str::to_string),
            encoding: element.attr("encoding").map(str::to_string),
            schema: element.attr("schema").map(str::to_string),
            ..Self::default()
        }
    }
}

/// Value of an execute input. One kind per input.
#[derive(Debug, Clone)]
pub enum InputValue {
    Literal(String),
    Complex(ComplexDataInput),
    BoundingBox(BoundingBox),
    Fragment(Arc<dyn RequestFragment>),
}

impl InputValue {
    pub fn kind(&self) -> DataKind {
        match self {
            InputValue::Literal(_) => DataKind::LiteralData,
            InputValue::Complex(_) => DataKind::ComplexData,
            InputValue::BoundingBox(_) => DataKind::BoundingBoxData,
            InputValue::Fragment(fragment) => element_kind(&fragment.to_request_fragment()),
        }
    }
}

impl PartialEq for InputValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (InputValue::Literal(a), InputValue::Literal(b)) => a == b,
            (InputValue::Complex(a), InputValue::Complex(b)) => a == b,
            (InputValue::BoundingBox(a), InputValue::BoundingBox(b)) => a == b,
            (InputValue::Fragment(a), InputValue::Fragment(b)) => {
                a.to_request_fragment() == b.to_request_fragment()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteInput {
    pub identifier: String,
    pub value: InputValue,
}

impl ExecuteInput {
    pub fn literal(identifier: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            value: InputValue::Literal(value.into()),
        }
    }

    pub fn complex(identifier: impl Into<String>, data: ComplexDataInput) -> Self {
        Self {
            identifier: identifier.into(),
            value: InputValue::Complex(data),
        }
    }

    pub fn bounding_box(identifier: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            identifier: identifier.into(),
            value: InputValue::BoundingBox(bbox),
        }
    }

    pub fn fragment(identifier: impl Into<String>, fragment: impl RequestFragment + 'static) -> Self {
        Self {
            identifier: identifier.into(),
            value: InputValue::Fragment(Arc::new(fragment)),
        }
    }

    pub fn kind(&self) -> DataKind {
        self.value.kind()
    }

    pub fn validate(&self) -> WpsResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(WpsError::Validation("input identifier is empty".to_string()));
        }
        match &self.value {
            InputValue::Literal(_) => Ok(()),
            InputValue::Complex(complex) => complex.validate(&self.identifier),
            InputValue::BoundingBox(bbox) => bbox.validate().map_err(|e| {
                WpsError::Validation(format!(
                    "bounding box input '{}': {}",
                    self.identifier, e
                ))
            }),
            InputValue::Fragment(fragment) => {
                let element = fragment.to_request_fragment();
                if element.is("Reference", Some(WPS_1_0_0)) || element.is("Data", Some(WPS_1_0_0)) {
                    Ok(())
                } else {
                    Err(WpsError::Validation(format!(
                        "input '{}' fragment must be wps:Reference or wps:Data, got <{}>",
                        self.identifier,
                        element.local_name()
                    )))
                }
            }
        }
    }

    /// Render as `wps:Input`. Call [`validate`](Self::validate) first.
    pub fn to_element(&self) -> Element {
        let body = match &self.value {
            InputValue::Literal(value) => Element::new(WPS_1_0_0, "Data")
                .with_child(Element::new(WPS_1_0_0, "LiteralData").with_text(value.as_str())),
            InputValue::Complex(complex) => complex.to_element(),
            InputValue::BoundingBox(bbox) => {
                Element::new(WPS_1_0_0, "Data").with_child(bbox.to_element(WPS_1_0_0, "BoundingBoxData"))
            }
            InputValue::Fragment(fragment) => fragment.to_request_fragment(),
        };

        Element::new(WPS_1_0_0, "Input")
            .with_child(Element::new(OWS_1_1, "Identifier").with_text(self.identifier.as_str()))
            .with_child(body)
    }

    /// Read a `wps:Input` element back. Fragments come back as the plain
    /// reference or data they rendered.
    pub fn from_element(element: &Element) -> WpsResult<Self> {
        let identifier = element
            .child_text("Identifier")
            .ok_or_else(|| OwsError::MissingElement("ows:Identifier in Input".to_string()))?;

        if let Some(reference) = element.child_local("Reference") {
            return Ok(Self::complex(identifier, ComplexDataInput::from_reference(reference)));
        }

        let data = element
            .child_local("Data")
            .and_then(Element::first_element)
            .ok_or_else(|| OwsError::MissingElement(format!("wps:Data in input '{}'", identifier)))?;

        let value = match data.local_name() {
            "LiteralData" => InputValue::Literal(data.text()),
            "ComplexData" => InputValue::Complex(ComplexDataInput::from_complex_data(data)?),
            "BoundingBoxData" => InputValue::BoundingBox(BoundingBox::from_element(data)?),
            other => {
                return Err(OwsError::MissingElement(format!(
                    "LiteralData, ComplexData or BoundingBoxData in input '{}', found {}",
                    identifier, other
                ))
                .into())
            }
        };
        Ok(Self { identifier, value })
    }
}

/// Markup to embed verbatim, with any XML declaration removed. `None` for
/// payloads that are plain text.
fn xml_body(payload: &str) -> Option<&str> {
    let trimmed = payload.trim();
    if !trimmed.starts_with('<') {
        return None;
    }
    if trimmed.starts_with("<?xml") {
        let end = trimmed.find("?>")?;
        return Some(trimmed[end + 2..].trim_start());
    }
    Some(trimmed)
}

/// Serialized content with outer whitespace removed. Stable under a further
/// parse and serialize.
pub(crate) fn canonical_markup(nodes: Vec<Node>) -> WpsResult<String> {
    let mut content = Element::unqualified("content");
    content.children = nodes;
    Ok(content.inner_xml(Namespaces::ogc())?.trim().to_string())
}

fn normalize_payload(payload: String) -> String {
    let canonical = xml_body(&payload)
        .and_then(|body| parse_fragment(body).ok())
        .and_then(|nodes| canonical_markup(nodes).ok());
    canonical.unwrap_or(payload)
}

fn element_kind(element: &Element) -> DataKind {
    match element.first_element().map(Element::local_name) {
        Some("LiteralData") if element.local_name() == "Data" => DataKind::LiteralData,
        Some("BoundingBoxData") if element.local_name() == "Data" => DataKind::BoundingBoxData,
        _ => DataKind::ComplexData,
    }
}

/// One `wfs:Query` of a GetFeature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfsQuery {
    pub type_name: String,
    pub property_names: Vec<String>,
    /// Restricts the query to these `gml:id`s.
    pub feature_ids: Vec<String>,
}

impl WfsQuery {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            property_names: Vec::new(),
            feature_ids: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        self.property_names.push(name.into());
        self
    }

    pub fn with_feature_id(mut self, id: impl Into<String>) -> Self {
        self.feature_ids.push(id.into());
        self
    }

    fn to_element(&self) -> Element {
        let mut query = Element::new(WFS, "Query").with_attr("typeName", self.type_name.as_str());
        for name in &self.property_names {
            query.push_child(Element::new(WFS, "PropertyName").with_text(name.as_str()));
        }
        if !self.feature_ids.is_empty() {
            let mut filter = Element::new(OGC, "Filter");
            for id in &self.feature_ids {
                filter.push_child(Element::new(OGC, "GmlObjectId").with_ns_attr(GML, "id", id.as_str()));
            }
            query.push_child(filter);
        }
        query
    }
}

/// Complex input fetched by the WPS server itself with a WFS 1.1.0
/// GetFeature POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfsFeatureCollection {
    pub wfs_url: String,
    pub queries: Vec<WfsQuery>,
    pub output_format: Option<String>,
}

impl WfsFeatureCollection {
    pub fn new(wfs_url: impl Into<String>, query: WfsQuery) -> Self {
        Self {
            wfs_url: wfs_url.into(),
            queries: vec![query],
            output_format: None,
        }
    }

    pub fn with_query(mut self, query: WfsQuery) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }
}

impl RequestFragment for WfsFeatureCollection {
    fn to_request_fragment(&self) -> Element {
        let mut get_feature = Element::new(WFS, "GetFeature")
            .with_attr("service", "WFS")
            .with_attr("version", "1.1.0");
        if let Some(format) = &self.output_format {
            get_feature = get_feature.with_attr("outputFormat", format.as_str());
        }
        for query in &self.queries {
            get_feature.push_child(query.to_element());
        }

        Element::new(WPS_1_0_0, "Reference")
            .with_ns_attr(XLINK, "href", self.wfs_url.as_str())
            .with_attr("method", "POST")
            .with_attr("mimeType", "text/xml")
            .with_child(Element::new(WPS_1_0_0, "Body").with_child(get_feature))
    }
}
