//! Process briefs and DescribeProcess documents.

use ows_common::namespaces::{WPS_1_0_0, XLINK};
use ows_common::{Element, OwsError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WpsError, WpsResult};
use crate::literal::LiteralType;

/// Discriminant of the three WPS data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    LiteralData,
    ComplexData,
    BoundingBoxData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataLink {
    pub title: Option<String>,
    pub href: Option<String>,
}

impl MetadataLink {
    fn from_element(element: &Element) -> Self {
        Self {
            title: element.attr_ns("title", XLINK).map(str::to_string),
            href: element.attr_ns("href", XLINK).map(str::to_string),
        }
    }
}

/// Identifier, title and abstract of a process as listed in capabilities or
/// echoed in an execute response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessBrief {
    pub identifier: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    /// `wps:processVersion`
    pub version: Option<String>,
    pub metadata: Vec<MetadataLink>,
}

impl ProcessBrief {
    pub fn from_element(element: &Element) -> WpsResult<Self> {
        Ok(Self {
            identifier: identifier_of(element)?,
            title: element.child_text("Title"),
            abstract_text: element.child_text("Abstract"),
            version: element.attr_local("processVersion").map(str::to_string),
            metadata: metadata_of(element),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub schema: Option<String>,
}

impl Format {
    fn from_element(element: &Element) -> Self {
        Self {
            mime_type: element.child_text("MimeType"),
            encoding: element.child_text("Encoding"),
            schema: element.child_text("Schema"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    /// `rangeClosure`: closed, open, closed-open or open-closed.
    pub closure: Option<String>,
}

/// Values a literal input accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum AllowedValues {
    /// `ows:AnyValue`, or no restriction given.
    #[default]
    Any,
    /// Looked up elsewhere (`ValuesReference`).
    Reference(Option<String>),
    Restricted {
        values: Vec<String>,
        ranges: Vec<ValueRange>,
    },
}

impl AllowedValues {
    fn from_literal(element: &Element) -> Self {
        if let Some(allowed) = element.child_local("AllowedValues") {
            let values = allowed
                .children_local("Value")
                .map(|v| v.text().trim().to_string())
                .collect();
            let ranges = allowed
                .children_local("Range")
                .map(|r| ValueRange {
                    minimum: r.child_text("MinimumValue"),
                    maximum: r.child_text("MaximumValue"),
                    closure: r.attr_local("rangeClosure").map(str::to_string),
                })
                .collect();
            return AllowedValues::Restricted { values, ranges };
        }
        if let Some(reference) = element.child_local("ValuesReference") {
            return AllowedValues::Reference(reference.attr_local("reference").map(str::to_string));
        }
        AllowedValues::Any
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteralDescription {
    pub data_type: LiteralType,
    /// Type reference as written by the server, e.g. `xs:integer`.
    pub data_type_reference: Option<String>,
    pub uoms: Vec<String>,
    pub allowed_values: AllowedValues,
    pub default_value: Option<String>,
}

impl LiteralDescription {
    fn from_element(element: &Element) -> Self {
        let data_type_reference = element.child_local("DataType").and_then(|dt| {
            dt.attr_local("reference")
                .map(str::to_string)
                .or_else(|| Some(dt.text().trim().to_string()).filter(|t| !t.is_empty()))
        });
        let uoms = element
            .child_local("UOMs")
            .map(|u| {
                u.elements()
                    .flat_map(|group| group.children_local("UOM"))
                    .map(|uom| uom.text().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            data_type: data_type_reference
                .as_deref()
                .map(LiteralType::from_data_type)
                .unwrap_or_default(),
            data_type_reference,
            uoms,
            allowed_values: AllowedValues::from_literal(element),
            default_value: element.child_text("DefaultValue"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexDescription {
    pub default_format: Option<Format>,
    pub supported_formats: Vec<Format>,
    pub maximum_megabytes: Option<f64>,
}

impl ComplexDescription {
    fn from_element(element: &Element) -> Self {
        Self {
            default_format: element
                .child_local("Default")
                .and_then(|d| d.child_local("Format"))
                .map(Format::from_element),
            supported_formats: element
                .child_local("Supported")
                .map(|s| s.children_local("Format").map(Format::from_element).collect())
                .unwrap_or_default(),
            maximum_megabytes: element
                .attr("maximumMegabytes")
                .and_then(|v| v.trim().parse().ok()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBoxDescription {
    pub default_crs: Option<String>,
    pub supported_crs: Vec<String>,
}

impl BoundingBoxDescription {
    fn from_element(element: &Element) -> Self {
        Self {
            default_crs: element
                .child_local("Default")
                .and_then(|d| d.child_text("CRS")),
            supported_crs: element
                .child_local("Supported")
                .map(|s| {
                    s.children_local("CRS")
                        .map(|c| c.text().trim().to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Kind-specific facets of an input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataDescription {
    Literal(LiteralDescription),
    Complex(ComplexDescription),
    BoundingBox(BoundingBoxDescription),
}

impl DataDescription {
    pub fn kind(&self) -> DataKind {
        match self {
            DataDescription::Literal(_) => DataKind::LiteralData,
            DataDescription::Complex(_) => DataKind::ComplexData,
            DataDescription::BoundingBox(_) => DataKind::BoundingBoxData,
        }
    }

    pub fn literal_type(&self) -> Option<LiteralType> {
        match self {
            DataDescription::Literal(literal) => Some(literal.data_type),
            _ => None,
        }
    }

    /// Inputs use `*Data` element names, outputs `*Output`.
    fn from_parent(parent: &Element, literal: &str, complex: &str, bbox: &str) -> WpsResult<Self> {
        if let Some(e) = parent.child_local(literal) {
            Ok(DataDescription::Literal(LiteralDescription::from_element(e)))
        } else if let Some(e) = parent.child_local(complex) {
            Ok(DataDescription::Complex(ComplexDescription::from_element(e)))
        } else if let Some(e) = parent.child_local(bbox) {
            Ok(DataDescription::BoundingBox(BoundingBoxDescription::from_element(e)))
        } else {
            Err(OwsError::MissingElement(format!("{}, {} or {}", literal, complex, bbox)).into())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub identifier: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub min_occurs: u32,
    /// `None` when unbounded.
    pub max_occurs: Option<u32>,
    pub data: DataDescription,
    pub metadata: Vec<MetadataLink>,
}

impl InputDescriptor {
    fn from_element(element: &Element) -> WpsResult<Self> {
        Ok(Self {
            identifier: identifier_of(element)?,
            title: element.child_text("Title"),
            abstract_text: element.child_text("Abstract"),
            min_occurs: element
                .attr("minOccurs")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1),
            max_occurs: match element.attr("maxOccurs").map(str::trim) {
                None => Some(1),
                Some(v) => v.parse().ok(),
            },
            data: DataDescription::from_parent(
                element,
                "LiteralData",
                "ComplexData",
                "BoundingBoxData",
            )?,
            metadata: metadata_of(element),
        })
    }

    pub fn kind(&self) -> DataKind {
        self.data.kind()
    }

    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub identifier: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub data: DataDescription,
    pub metadata: Vec<MetadataLink>,
}

impl OutputDescriptor {
    fn from_element(element: &Element) -> WpsResult<Self> {
        Ok(Self {
            identifier: identifier_of(element)?,
            title: element.child_text("Title"),
            abstract_text: element.child_text("Abstract"),
            data: DataDescription::from_parent(
                element,
                "LiteralOutput",
                "ComplexOutput",
                "BoundingBoxOutput",
            )?,
            metadata: metadata_of(element),
        })
    }

    pub fn kind(&self) -> DataKind {
        self.data.kind()
    }
}

/// A process as described by DescribeProcess. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescription {
    pub identifier: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub version: Option<String>,
    pub store_supported: bool,
    pub status_supported: bool,
    pub metadata: Vec<MetadataLink>,
    pub inputs: Vec<InputDescriptor>,
    pub outputs: Vec<OutputDescriptor>,
}

impl ProcessDescription {
    pub fn from_element(element: &Element) -> WpsResult<Self> {
        let brief = ProcessBrief::from_element(element)?;
        let inputs = match element.child_local("DataInputs") {
            Some(list) => list
                .children_local("Input")
                .map(InputDescriptor::from_element)
                .collect::<WpsResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        let outputs = match element.child_local("ProcessOutputs") {
            Some(list) => list
                .children_local("Output")
                .map(OutputDescriptor::from_element)
                .collect::<WpsResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            identifier: brief.identifier,
            title: brief.title,
            abstract_text: brief.abstract_text,
            version: brief.version,
            store_supported: flag(element, "storeSupported"),
            status_supported: flag(element, "statusSupported"),
            metadata: brief.metadata,
            inputs,
            outputs,
        })
    }

    pub fn input(&self, identifier: &str) -> Option<&InputDescriptor> {
        self.inputs.iter().find(|i| i.identifier == identifier)
    }

    pub fn output(&self, identifier: &str) -> Option<&OutputDescriptor> {
        self.outputs.iter().find(|o| o.identifier == identifier)
    }

    /// Asynchronous execution needs both stored responses and status updates.
    pub fn supports_async(&self) -> bool {
        self.store_supported && self.status_supported
    }
}

/// Parse a `wps:ProcessDescriptions` document.
pub fn parse_process_descriptions(root: &Element) -> WpsResult<Vec<ProcessDescription>> {
    if !root.is("ProcessDescriptions", Some(WPS_1_0_0)) {
        return Err(WpsError::UnexpectedDocument {
            expected: "wps:ProcessDescriptions".to_string(),
            found: root.local_name().to_string(),
        });
    }

    let descriptions = root
        .children_local("ProcessDescription")
        .map(ProcessDescription::from_element)
        .collect::<WpsResult<Vec<_>>>()?;
    debug!(count = descriptions.len(), "Parsed process descriptions");
    Ok(descriptions)
}

fn identifier_of(element: &Element) -> WpsResult<String> {
    element.child_text("Identifier").ok_or_else(|| {
        OwsError::MissingElement(format!("ows:Identifier in {}", element.local_name())).into()
    })
}

fn metadata_of(element: &Element) -> Vec<MetadataLink> {
    element
        .children_local("Metadata")
        .map(MetadataLink::from_element)
        .collect()
}

fn flag(element: &Element, name: &str) -> bool {
    element
        .attr(name)
        .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
}
