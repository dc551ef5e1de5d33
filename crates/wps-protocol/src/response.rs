//! Execute response parsing.
//!
//! Parsing is pure: a document becomes a [`ParsedResponse`], which
//! [`Execution::apply`](crate::Execution::apply) folds into the execution
//! state. Documents that cannot be read as a status are not errors; they
//! come back as [`ParsedResponse::Unrecognized`] and end the execution.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ows_common::namespaces::WPS_1_0_0;
use ows_common::{is_exception_report, parse, parse_exception_report, Element};
use tracing::{debug, warn};

use crate::error::WpsResult;
use crate::execution::ExecutionError;
use crate::output::OutputResult;
use crate::process::{ProcessBrief, ProcessDescription};
use crate::request::OutputRequest;
use crate::status::ExecutionStatus;

/// Error code recorded for documents that are not a readable status.
pub const FORMAT_ERROR_CODE: &str = "FormatError";

/// Content of a `wps:ExecuteResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResponse {
    pub service_instance: Option<String>,
    pub status_location: Option<String>,
    pub status: ExecutionStatus,
    /// Progress implied by the status element, when it implies one.
    pub percent_completed: Option<u8>,
    pub status_message: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    /// Exceptions embedded in `wps:ProcessFailed`.
    pub errors: Vec<ExecutionError>,
    pub process: Option<ProcessBrief>,
    /// Lists are `None` when the document does not carry the section.
    pub data_inputs: Option<Vec<OutputResult>>,
    pub output_definitions: Option<Vec<OutputRequest>>,
    pub process_outputs: Option<Vec<OutputResult>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Execute(Box<ExecuteResponse>),
    Exception(Vec<ExecutionError>),
    /// Anything else, with a description of what was wrong.
    Unrecognized(String),
}

type RootParser = fn(&Element, Option<&ProcessDescription>) -> WpsResult<ParsedResponse>;

/// Root elements with a dedicated parser. Any other root is unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseRoot {
    ExecuteResponse,
    ExceptionReport,
}

impl ResponseRoot {
    const ALL: [ResponseRoot; 2] = [ResponseRoot::ExecuteResponse, ResponseRoot::ExceptionReport];

    fn matches(self, root: &Element) -> bool {
        match self {
            ResponseRoot::ExecuteResponse => root.is("ExecuteResponse", Some(WPS_1_0_0)),
            ResponseRoot::ExceptionReport => is_exception_report(root),
        }
    }

    fn parser(self) -> RootParser {
        match self {
            ResponseRoot::ExecuteResponse => parse_execute_response,
            ResponseRoot::ExceptionReport => parse_exception_root,
        }
    }
}

fn parse_exception_root(root: &Element, _: Option<&ProcessDescription>) -> WpsResult<ParsedResponse> {
    Ok(ParsedResponse::Exception(parse_exception_report(root)))
}

/// Parse a response document.
///
/// `description` supplies literal types for values without a `dataType`.
/// A literal that does not cast to its type is the only error.
pub fn parse_response(root: &Element, description: Option<&ProcessDescription>) -> WpsResult<ParsedResponse> {
    match ResponseRoot::ALL.into_iter().find(|r| r.matches(root)) {
        Some(kind) => {
            debug!(root = ?kind, "Parsing response document");
            (kind.parser())(root, description)
        }
        None => Ok(unrecognized(format!(
            "Unexpected root element <{}>",
            root.local_name()
        ))),
    }
}

/// Parse raw response bytes. Bytes that are not XML are unrecognized.
pub fn parse_response_bytes(bytes: &[u8], description: Option<&ProcessDescription>) -> WpsResult<ParsedResponse> {
    match parse(bytes) {
        Ok(root) => parse_response(&root, description),
        Err(e) => Ok(unrecognized(format!("Response is not well-formed XML: {}", e))),
    }
}

fn unrecognized(message: String) -> ParsedResponse {
    warn!(%message, "Unrecognized response document");
    ParsedResponse::Unrecognized(message)
}

fn parse_execute_response(root: &Element, description: Option<&ProcessDescription>) -> WpsResult<ParsedResponse> {
    let Some(status_element) = root.child_local("Status") else {
        return Ok(unrecognized("ExecuteResponse has no wps:Status".to_string()));
    };
    let Some(tag) = status_element.first_element() else {
        return Ok(unrecognized("wps:Status is empty".to_string()));
    };
    let Some(status) = ExecutionStatus::from_tag(tag.local_name()) else {
        return Ok(unrecognized(format!("Unknown status <{}>", tag.local_name())));
    };

    let percent_completed = match status {
        ExecutionStatus::ProcessStarted | ExecutionStatus::ProcessPaused => Some(
            tag.attr("percentCompleted")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .map_or(0, |p| p.min(100) as u8),
        ),
        ExecutionStatus::ProcessSucceeded => Some(100),
        _ => None,
    };

    let errors = tag
        .child_local("ExceptionReport")
        .map(parse_exception_report)
        .unwrap_or_default();

    let process = match root.child_local("Process") {
        Some(element) => Some(ProcessBrief::from_element(element)?),
        None => None,
    };

    let data_inputs = match root.child_local("DataInputs") {
        Some(list) => Some(
            list.children_local("Input")
                .map(|input| {
                    let declared = description
                        .and_then(|d| input.child_text("Identifier").and_then(|id| d.input(&id)))
                        .and_then(|i| i.data.literal_type());
                    OutputResult::from_element(input, declared)
                })
                .collect::<WpsResult<Vec<_>>>()?,
        ),
        None => None,
    };

    let process_outputs = match root.child_local("ProcessOutputs") {
        Some(list) => Some(
            list.children_local("Output")
                .map(|output| {
                    let declared = description
                        .and_then(|d| output.child_text("Identifier").and_then(|id| d.output(&id)))
                        .and_then(|o| o.data.literal_type());
                    OutputResult::from_element(output, declared)
                })
                .collect::<WpsResult<Vec<_>>>()?,
        ),
        None => None,
    };

    let output_definitions = root.child_local("OutputDefinitions").map(|list| {
        list.children_local("Output")
            .map(|output| OutputRequest {
                identifier: output.child_text("Identifier").unwrap_or_default(),
                as_reference: output
                    .attr("asReference")
                    .map_or(false, |v| v.trim().eq_ignore_ascii_case("true")),
                mime_type: output.attr("mimeType").map(str::to_string),
                encoding: output.attr("encoding").map(str::to_string),
                schema: output.attr("schema").map(str::to_string),
            })
            .collect()
    });

    Ok(ParsedResponse::Execute(Box::new(ExecuteResponse {
        service_instance: root.attr("serviceInstance").map(str::to_string),
        status_location: root
            .attr("statusLocation")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        status,
        percent_completed,
        status_message: Some(tag.text().trim().to_string()).filter(|t| !t.is_empty()),
        creation_time: status_element.attr("creationTime").and_then(parse_creation_time),
        errors,
        process,
        data_inputs,
        output_definitions,
        process_outputs,
    })))
}

/// RFC 3339, or a bare local timestamp taken as UTC.
fn parse_creation_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|t| Utc.from_utc_datetime(&t)))
        .map_err(|e| warn!(value, error = %e, "Ignoring unparseable creationTime"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WpsError;
    use crate::literal::{LiteralType, LiteralValue};
    use crate::process::parse_process_descriptions;

    const NS: &str = r#"xmlns:wps="http://www.opengis.net/wps/1.0.0" xmlns:ows="http://www.opengis.net/ows/1.1" xmlns:xlink="http://www.w3.org/1999/xlink""#;

    fn parsed(xml: &str) -> ParsedResponse {
        parse_response_bytes(xml.as_bytes(), None).unwrap()
    }

    fn execute(xml: &str) -> ExecuteResponse {
        match parsed(xml) {
            ParsedResponse::Execute(response) => *response,
            other => panic!("expected execute response, got {:?}", other),
        }
    }

    #[test]
    fn test_accepted_response() {
        let xml = format!(
            r#"<wps:ExecuteResponse {NS} serviceInstance="http://wps/?service=WPS" statusLocation="http://wps/status/1.xml">
  <wps:Process wps:processVersion="1"><ows:Identifier>DoubleIt</ows:Identifier></wps:Process>
  <wps:Status creationTime="2024-05-01T12:00:00Z"><wps:ProcessAccepted>queued</wps:ProcessAccepted></wps:Status>
</wps:ExecuteResponse>"#
        );
        let response = execute(&xml);
        assert_eq!(response.status, ExecutionStatus::ProcessAccepted);
        assert_eq!(response.status_location.as_deref(), Some("http://wps/status/1.xml"));
        assert_eq!(response.service_instance.as_deref(), Some("http://wps/?service=WPS"));
        assert_eq!(response.status_message.as_deref(), Some("queued"));
        assert_eq!(response.percent_completed, None);
        assert_eq!(response.process.unwrap().identifier, "DoubleIt");
        assert_eq!(
            response.creation_time.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );
        assert!(response.process_outputs.is_none());
    }

    #[test]
    fn test_started_percent() {
        let xml = format!(
            r#"<wps:ExecuteResponse {NS}><wps:Status><wps:ProcessStarted percentCompleted="42">working</wps:ProcessStarted></wps:Status></wps:ExecuteResponse>"#
        );
        let response = execute(&xml);
        assert_eq!(response.status, ExecutionStatus::ProcessStarted);
        assert_eq!(response.percent_completed, Some(42));
    }

    #[test]
    fn test_failed_with_embedded_exceptions() {
        let xml = format!(
            r#"<wps:ExecuteResponse {NS}>
  <wps:Status>
    <wps:ProcessFailed>
      <ows:ExceptionReport version="1.0.0">
        <ows:Exception exceptionCode="NoApplicableCode" locator="buffer"><ows:ExceptionText>out of memory</ows:ExceptionText></ows:Exception>
      </ows:ExceptionReport>
    </wps:ProcessFailed>
  </wps:Status>
</wps:ExecuteResponse>"#
        );
        let response = execute(&xml);
        assert_eq!(response.status, ExecutionStatus::ProcessFailed);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].locator.as_deref(), Some("buffer"));
        assert_eq!(response.errors[0].text, "out of memory");
    }

    #[test]
    fn test_succeeded_outputs_and_lineage() {
        let xml = format!(
            r#"<wps:ExecuteResponse {NS}>
  <wps:Status><wps:ProcessSucceeded>done</wps:ProcessSucceeded></wps:Status>
  <wps:DataInputs>
    <wps:Input><ows:Identifier>NumberToDouble</ows:Identifier><wps:Data><wps:LiteralData>4</wps:LiteralData></wps:Data></wps:Input>
  </wps:DataInputs>
  <wps:OutputDefinitions>
    <wps:Output asReference="true" mimeType="text/xml"><ows:Identifier>map</ows:Identifier></wps:Output>
  </wps:OutputDefinitions>
  <wps:ProcessOutputs>
    <wps:Output><ows:Identifier>map</ows:Identifier><wps:Reference xlink:href="http://wps/out/map.xml" mimeType="text/xml"/></wps:Output>
    <wps:Output><ows:Identifier>count</ows:Identifier><wps:Data><wps:LiteralData dataType="integer">3</wps:LiteralData></wps:Data></wps:Output>
    <wps:Output><ows:Identifier>shape</ows:Identifier><wps:Data><wps:ComplexData mimeType="text/xml"><gml:Point xmlns:gml="http://www.opengis.net/gml"><gml:pos>1 2</gml:pos></gml:Point></wps:ComplexData></wps:Data></wps:Output>
  </wps:ProcessOutputs>
</wps:ExecuteResponse>"#
        );
        let response = execute(&xml);
        assert_eq!(response.percent_completed, Some(100));

        let inputs = response.data_inputs.unwrap();
        assert_eq!(inputs[0].literal(), Some(&LiteralValue::String("4".to_string())));

        let definitions = response.output_definitions.unwrap();
        assert!(definitions[0].as_reference);
        assert_eq!(definitions[0].identifier, "map");

        let outputs = response.process_outputs.unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].reference().unwrap().href, "http://wps/out/map.xml");
        assert_eq!(outputs[1].literal(), Some(&LiteralValue::Integer(3)));
        match &outputs[2].data {
            Some(crate::output::OutputData::Complex(complex)) => {
                assert!(complex.payload.contains("<gml:pos>1 2</gml:pos>"));
                assert_eq!(complex.mime_type.as_deref(), Some("text/xml"));
            }
            other => panic!("expected complex output, got {:?}", other),
        }
    }

    #[test]
    fn test_exception_report_root() {
        let xml = r#"<ExceptionReport xmlns="http://www.opengis.net/ows/1.1">
  <Exception exceptionCode="InvalidParameterValue" locator="identifier"><ExceptionText>no such process</ExceptionText></Exception>
  <Exception exceptionCode="NoApplicableCode"/>
</ExceptionReport>"#;
        match parsed(xml) {
            ParsedResponse::Exception(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].code.as_deref(), Some("InvalidParameterValue"));
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_documents() {
        assert!(matches!(parsed("<html><body>502</body></html>"), ParsedResponse::Unrecognized(_)));
        assert!(matches!(parsed("Service Unavailable"), ParsedResponse::Unrecognized(_)));
        let no_status = format!(r#"<wps:ExecuteResponse {NS}/>"#);
        assert!(matches!(parsed(&no_status), ParsedResponse::Unrecognized(_)));
        let unknown = format!(
            r#"<wps:ExecuteResponse {NS}><wps:Status><wps:ProcessRunning/></wps:Status></wps:ExecuteResponse>"#
        );
        assert!(matches!(parsed(&unknown), ParsedResponse::Unrecognized(_)));
    }

    #[test]
    fn test_declared_type_from_description() {
        let describe = r#"<wps:ProcessDescriptions xmlns:wps="http://www.opengis.net/wps/1.0.0" xmlns:ows="http://www.opengis.net/ows/1.1">
  <ProcessDescription><ows:Identifier>DoubleIt</ows:Identifier>
    <ProcessOutputs><Output><ows:Identifier>result</ows:Identifier><LiteralOutput><ows:DataType>integer</ows:DataType></LiteralOutput></Output></ProcessOutputs>
  </ProcessDescription>
</wps:ProcessDescriptions>"#;
        let description = parse_process_descriptions(&parse(describe.as_bytes()).unwrap())
            .unwrap()
            .remove(0);

        let xml = format!(
            r#"<wps:ExecuteResponse {NS}><wps:Status><wps:ProcessSucceeded/></wps:Status>
  <wps:ProcessOutputs><wps:Output><ows:Identifier>result</ows:Identifier><wps:Data><wps:LiteralData>8</wps:LiteralData></wps:Data></wps:Output></wps:ProcessOutputs>
</wps:ExecuteResponse>"#
        );
        let ParsedResponse::Execute(response) = parse_response_bytes(xml.as_bytes(), Some(&description)).unwrap() else {
            panic!("expected execute response");
        };
        let outputs = response.process_outputs.unwrap();
        assert_eq!(outputs[0].literal(), Some(&LiteralValue::Integer(8)));
        assert_eq!(outputs[0].data_type.as_deref(), Some(LiteralType::Integer.as_str()));

        let bad = xml.replace(">8<", ">eight<");
        assert!(matches!(
            parse_response_bytes(bad.as_bytes(), Some(&description)),
            Err(WpsError::Value(_))
        ));
    }
}
