//! Execute request building and KVP parameters for the other operations.

use std::collections::HashSet;

use ows_common::namespaces::{OWS_1_1, WPS_1_0_0, XSI};
use ows_common::{Element, Namespaces};
use serde::{Deserialize, Serialize};

use crate::error::{WpsError, WpsResult};
use crate::input::ExecuteInput;
use crate::process::ProcessDescription;

pub const WPS_VERSION: &str = "1.0.0";

const EXECUTE_SCHEMA_LOCATION: &str =
    "http://www.opengis.net/wps/1.0.0 http://schemas.opengis.net/wps/1.0.0/wpsExecute_request.xsd";

/// How the server should run the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteMode {
    /// `storeExecuteResponse="false" status="false"`
    Sync,
    /// `storeExecuteResponse="true" status="true"`
    Async,
    /// Attributes omitted; the server default applies.
    #[default]
    Auto,
}

impl ExecuteMode {
    /// Resolve `Auto` against a description: asynchronous when the process
    /// supports both stored responses and status updates.
    pub fn resolve(self, description: Option<&ProcessDescription>) -> Self {
        match (self, description) {
            (ExecuteMode::Auto, Some(d)) if d.supports_async() => ExecuteMode::Async,
            (ExecuteMode::Auto, Some(_)) => ExecuteMode::Sync,
            (mode, _) => mode,
        }
    }

    fn flag(self) -> Option<&'static str> {
        match self {
            ExecuteMode::Sync => Some("false"),
            ExecuteMode::Async => Some("true"),
            ExecuteMode::Auto => None,
        }
    }
}

/// An output the caller wants back, inline or by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub identifier: String,
    #[serde(default)]
    pub as_reference: bool,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub schema: Option<String>,
}

impl OutputRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn as_reference(mut self, as_reference: bool) -> Self {
        self.as_reference = as_reference;
        self
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

    fn to_element(&self, local: &str) -> Element {
        let mut element = Element::new(WPS_1_0_0, local);
        if local == "Output" {
            element = element.with_attr("asReference", if self.as_reference { "true" } else { "false" });
        }
        if let Some(mime_type) = &self.mime_type {
            element = element.with_attr("mimeType", mime_type.as_str());
        }
        if let Some(encoding) = &self.encoding {
            element = element.with_attr("encoding", encoding.as_str());
        }
        if let Some(schema) = &self.schema {
            element = element.with_attr("schema", schema.as_str());
        }
        element.with_child(Element::new(OWS_1_1, "Identifier").with_text(self.identifier.as_str()))
    }
}

/// `wps:ResponseForm` content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseForm {
    /// An ExecuteResponse document listing these outputs.
    Document(Vec<OutputRequest>),
    /// The single output's data as the whole HTTP response.
    RawData(OutputRequest),
}

impl ResponseForm {
    fn validate(&self, mode: ExecuteMode, lineage: bool) -> WpsResult<()> {
        match self {
            ResponseForm::RawData(output) => {
                if mode == ExecuteMode::Async {
                    return Err(WpsError::Validation(
                        "asynchronous execution cannot return raw data output".to_string(),
                    ));
                }
                if lineage {
                    return Err(WpsError::Validation(
                        "lineage cannot be combined with raw data output".to_string(),
                    ));
                }
                if output.as_reference {
                    return Err(WpsError::Validation(format!(
                        "raw data output '{}' cannot be returned as a reference",
                        output.identifier
                    )));
                }
                check_output_identifier(&output.identifier)
            }
            ResponseForm::Document(outputs) => {
                let mut seen = HashSet::new();
                for output in outputs {
                    check_output_identifier(&output.identifier)?;
                    if !seen.insert(output.identifier.as_str()) {
                        return Err(WpsError::Validation(format!(
                            "output '{}' is requested more than once",
                            output.identifier
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_output_identifier(identifier: &str) -> WpsResult<()> {
    if identifier.trim().is_empty() {
        return Err(WpsError::Validation("output identifier is empty".to_string()));
    }
    Ok(())
}

/// Build a `wps:Execute` document. Validates every argument first and has no
/// other effect.
pub fn build_request(
    process_identifier: &str,
    inputs: &[ExecuteInput],
    response_form: Option<&ResponseForm>,
    mode: ExecuteMode,
    lineage: bool,
) -> WpsResult<Element> {
    if process_identifier.trim().is_empty() {
        return Err(WpsError::Validation("process identifier is empty".to_string()));
    }
    for input in inputs {
        input.validate()?;
    }
    if let Some(form) = response_form {
        form.validate(mode, lineage)?;
    }

    let mut execute = Element::new(WPS_1_0_0, "Execute")
        .with_attr("service", "WPS")
        .with_attr("version", WPS_VERSION)
        .with_ns_attr(XSI, "schemaLocation", EXECUTE_SCHEMA_LOCATION)
        .with_child(Element::new(OWS_1_1, "Identifier").with_text(process_identifier));

    if !inputs.is_empty() {
        let mut data_inputs = Element::new(WPS_1_0_0, "DataInputs");
        for input in inputs {
            data_inputs.push_child(input.to_element());
        }
        execute.push_child(data_inputs);
    }

    if let Some(form) = response_form_element(response_form, mode, lineage) {
        execute.push_child(form);
    }
    Ok(execute)
}

fn response_form_element(
    response_form: Option<&ResponseForm>,
    mode: ExecuteMode,
    lineage: bool,
) -> Option<Element> {
    let child = match response_form {
        Some(ResponseForm::RawData(output)) => output.to_element("RawDataOutput"),
        Some(ResponseForm::Document(outputs)) => response_document(outputs, mode, lineage)?,
        None => response_document(&[], mode, lineage)?,
    };
    Some(Element::new(WPS_1_0_0, "ResponseForm").with_child(child))
}

/// `None` when there is nothing to say beyond the server defaults.
fn response_document(outputs: &[OutputRequest], mode: ExecuteMode, lineage: bool) -> Option<Element> {
    if outputs.is_empty() && mode == ExecuteMode::Auto && !lineage {
        return None;
    }

    let mut document = Element::new(WPS_1_0_0, "ResponseDocument");
    if let Some(flag) = mode.flag() {
        document = document
            .with_attr("storeExecuteResponse", flag)
            .with_attr("status", flag);
    }
    if lineage {
        document = document.with_attr("lineage", "true");
    }
    for output in outputs {
        document.push_child(output.to_element("Output"));
    }
    Some(document)
}

/// Builder for an execute request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub identifier: String,
    pub inputs: Vec<ExecuteInput>,
    pub response_form: Option<ResponseForm>,
    pub mode: ExecuteMode,
    pub lineage: bool,
    /// Used to resolve `Auto` and to type literal outputs.
    pub description: Option<ProcessDescription>,
}

impl ExecuteRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            inputs: Vec::new(),
            response_form: None,
            mode: ExecuteMode::Auto,
            lineage: false,
            description: None,
        }
    }

    pub fn input(mut self, input: ExecuteInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = ExecuteInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Request an output in the response document. Replaces a raw data form.
    pub fn output(mut self, output: OutputRequest) -> Self {
        match &mut self.response_form {
            Some(ResponseForm::Document(outputs)) => outputs.push(output),
            _ => self.response_form = Some(ResponseForm::Document(vec![output])),
        }
        self
    }

    pub fn raw_output(mut self, output: OutputRequest) -> Self {
        self.response_form = Some(ResponseForm::RawData(output));
        self
    }

    pub fn mode(mut self, mode: ExecuteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn lineage(mut self, lineage: bool) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn description(mut self, description: ProcessDescription) -> Self {
        self.description = Some(description);
        self
    }

    pub fn effective_mode(&self) -> ExecuteMode {
        self.mode.resolve(self.description.as_ref())
    }

    pub fn to_element(&self) -> WpsResult<Element> {
        build_request(
            &self.identifier,
            &self.inputs,
            self.response_form.as_ref(),
            self.effective_mode(),
            self.lineage,
        )
    }

    pub fn to_xml(&self) -> WpsResult<Vec<u8>> {
        Ok(self.to_element()?.to_bytes(Namespaces::ogc())?)
    }
}

/// Inputs of a `wps:Execute` document, in document order.
pub fn parse_execute_inputs(document: &Element) -> WpsResult<Vec<ExecuteInput>> {
    if !document.is("Execute", Some(WPS_1_0_0)) {
        return Err(WpsError::UnexpectedDocument {
            expected: "wps:Execute".to_string(),
            found: document.local_name().to_string(),
        });
    }
    match document.child_local("DataInputs") {
        Some(list) => list.children_local("Input").map(ExecuteInput::from_element).collect(),
        None => Ok(Vec::new()),
    }
}

fn kvp(request: &str) -> Vec<(String, String)> {
    vec![
        ("service".to_string(), "WPS".to_string()),
        ("request".to_string(), request.to_string()),
    ]
}

/// Query parameters for GetCapabilities.
pub fn get_capabilities_params() -> Vec<(String, String)> {
    let mut params = kvp("GetCapabilities");
    params.push(("acceptVersions".to_string(), WPS_VERSION.to_string()));
    params
}

/// Query parameters for DescribeProcess. `ALL` describes every process.
pub fn describe_process_params(identifiers: &[&str]) -> Vec<(String, String)> {
    let mut params = kvp("DescribeProcess");
    params.push(("version".to_string(), WPS_VERSION.to_string()));
    params.push(("identifier".to_string(), identifiers.join(",")));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ComplexDataInput, InputValue};
    use ows_common::parse;

    fn xml_of(element: &Element) -> String {
        element.to_xml_string(Namespaces::ogc()).unwrap()
    }

    #[test]
    fn test_minimal_request() {
        let element = build_request("DoubleIt", &[], None, ExecuteMode::Auto, false).unwrap();
        let xml = xml_of(&element);
        assert!(xml.starts_with("<wps:Execute"));
        assert!(xml.contains("service=\"WPS\" version=\"1.0.0\""));
        assert!(xml.contains("xsi:schemaLocation=\"http://www.opengis.net/wps/1.0.0 "));
        assert!(xml.contains("<ows:Identifier>DoubleIt</ows:Identifier>"));
        assert!(!xml.contains("DataInputs"));
        assert!(!xml.contains("ResponseForm"));
    }

    #[test]
    fn test_mode_attributes() {
        let sync = xml_of(&build_request("p", &[], None, ExecuteMode::Sync, false).unwrap());
        assert!(sync.contains("storeExecuteResponse=\"false\" status=\"false\""));

        let asynchronous = xml_of(&build_request("p", &[], None, ExecuteMode::Async, true).unwrap());
        assert!(asynchronous.contains("storeExecuteResponse=\"true\" status=\"true\" lineage=\"true\""));

        let form = ResponseForm::Document(vec![OutputRequest::new("out")]);
        let auto = xml_of(&build_request("p", &[], Some(&form), ExecuteMode::Auto, false).unwrap());
        assert!(auto.contains("<wps:ResponseDocument><wps:Output asReference=\"false\">"));
    }

    #[test]
    fn test_outputs_by_reference() {
        let form = ResponseForm::Document(vec![
            OutputRequest::new("a").as_reference(true).with_mime_type("image/tiff"),
            OutputRequest::new("b"),
        ]);
        let element = build_request("p", &[], Some(&form), ExecuteMode::Async, false).unwrap();
        let document = element
            .child("ResponseForm", WPS_1_0_0)
            .and_then(|f| f.child("ResponseDocument", WPS_1_0_0))
            .unwrap();
        let outputs: Vec<&Element> = document.children_named("Output", WPS_1_0_0).collect();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].attr("asReference"), Some("true"));
        assert_eq!(outputs[0].attr("mimeType"), Some("image/tiff"));
        assert_eq!(outputs[1].child_text("Identifier").as_deref(), Some("b"));
    }

    #[test]
    fn test_raw_data_output() {
        let form = ResponseForm::RawData(OutputRequest::new("result").with_mime_type("text/plain"));
        let xml = xml_of(&build_request("p", &[], Some(&form), ExecuteMode::Sync, false).unwrap());
        assert!(xml.contains("<wps:RawDataOutput mimeType=\"text/plain\">"));
        assert!(!xml.contains("ResponseDocument"));
    }

    #[test]
    fn test_raw_data_output_conflicts() {
        let raw = ResponseForm::RawData(OutputRequest::new("r"));
        for (mode, lineage) in [(ExecuteMode::Async, false), (ExecuteMode::Sync, true)] {
            let result = build_request("p", &[], Some(&raw), mode, lineage);
            assert!(matches!(result, Err(WpsError::Validation(_))));
        }
        let by_reference = ResponseForm::RawData(OutputRequest::new("r").as_reference(true));
        assert!(build_request("p", &[], Some(&by_reference), ExecuteMode::Sync, false).is_err());
    }

    #[test]
    fn test_duplicate_outputs_rejected() {
        let form = ResponseForm::Document(vec![OutputRequest::new("a"), OutputRequest::new("a")]);
        assert!(matches!(
            build_request("p", &[], Some(&form), ExecuteMode::Auto, false),
            Err(WpsError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_process_identifier_rejected() {
        assert!(matches!(
            build_request("", &[], None, ExecuteMode::Auto, false),
            Err(WpsError::Validation(_))
        ));
    }

    #[test]
    fn test_builder_and_inputs_roundtrip() {
        let request = ExecuteRequest::new("Buffer")
            .input(ExecuteInput::literal("distance", "10"))
            .input(ExecuteInput::complex(
                "geometry",
                ComplexDataInput::reference("http://example.com/geom.gml?x=1&y=2"),
            ))
            .output(OutputRequest::new("result").as_reference(true))
            .mode(ExecuteMode::Async);

        let bytes = request.to_xml().unwrap();
        assert!(bytes.starts_with(b"<?xml"));
        let parsed = parse_execute_inputs(&parse(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, request.inputs);
        assert!(matches!(parsed[1].value, InputValue::Complex(_)));
    }

    #[test]
    fn test_builder_output_replaces_raw_form() {
        let request = ExecuteRequest::new("p")
            .raw_output(OutputRequest::new("x"))
            .output(OutputRequest::new("y"));
        assert_eq!(
            request.response_form,
            Some(ResponseForm::Document(vec![OutputRequest::new("y")]))
        );
    }

    #[test]
    fn test_parse_inputs_rejects_other_documents() {
        let root = parse(b"<wps:ExecuteResponse xmlns:wps=\"http://www.opengis.net/wps/1.0.0\"/>").unwrap();
        assert!(matches!(
            parse_execute_inputs(&root),
            Err(WpsError::UnexpectedDocument { .. })
        ));
    }

    #[test]
    fn test_kvp_params() {
        let params = describe_process_params(&["ALL"]);
        assert!(params.contains(&("request".to_string(), "DescribeProcess".to_string())));
        assert!(params.contains(&("identifier".to_string(), "ALL".to_string())));
        assert!(get_capabilities_params().contains(&("service".to_string(), "WPS".to_string())));
    }
}
