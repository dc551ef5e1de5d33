//! Canned WPS 1.0.0 documents.
//!
//! Each builder returns a complete document as a server would send it, for
//! feeding a [`RecordingTransport`](crate::RecordingTransport).

const ROOT_NS: &str = r#"xmlns:wps="http://www.opengis.net/wps/1.0.0" xmlns:ows="http://www.opengis.net/ows/1.1" xmlns:xlink="http://www.w3.org/1999/xlink""#;

pub const SERVICE_URL: &str = "http://wps.example.com/wps";

fn execute_response(status_location: Option<&str>, status: &str, body: &str) -> String {
    let location = status_location
        .map(|l| format!(r#" statusLocation="{}""#, l))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wps:ExecuteResponse {ROOT_NS} service="WPS" version="1.0.0" xml:lang="en" serviceInstance="{SERVICE_URL}?service=WPS&amp;request=GetCapabilities"{location}>
  <wps:Process wps:processVersion="1">
    <ows:Identifier>DoubleIt</ows:Identifier>
    <ows:Title>Double a number</ows:Title>
  </wps:Process>
  <wps:Status creationTime="2024-05-01T12:00:00Z">
    {status}
  </wps:Status>{body}
</wps:ExecuteResponse>"#
    )
}

pub fn process_accepted(status_location: &str) -> String {
    execute_response(
        Some(status_location),
        "<wps:ProcessAccepted>Process accepted</wps:ProcessAccepted>",
        "",
    )
}

pub fn process_started(status_location: Option<&str>, percent: u8) -> String {
    execute_response(
        status_location,
        &format!(
            r#"<wps:ProcessStarted percentCompleted="{}">Running</wps:ProcessStarted>"#,
            percent
        ),
        "",
    )
}

pub fn process_paused(status_location: Option<&str>) -> String {
    execute_response(
        status_location,
        r#"<wps:ProcessPaused percentCompleted="50">Paused</wps:ProcessPaused>"#,
        "",
    )
}

/// Success with one inline literal output.
pub fn succeeded_literal(identifier: &str, value: &str, data_type: Option<&str>) -> String {
    let data_type = data_type
        .map(|t| format!(r#" dataType="{}""#, t))
        .unwrap_or_default();
    execute_response(
        None,
        "<wps:ProcessSucceeded>Process completed</wps:ProcessSucceeded>",
        &format!(
            r#"
  <wps:ProcessOutputs>
    <wps:Output>
      <ows:Identifier>{identifier}</ows:Identifier>
      <ows:Title>Result</ows:Title>
      <wps:Data><wps:LiteralData{data_type}>{value}</wps:LiteralData></wps:Data>
    </wps:Output>
  </wps:ProcessOutputs>"#
        ),
    )
}

/// Success with outputs stored on the server, as (identifier, href) pairs.
pub fn succeeded_references(outputs: &[(&str, &str)]) -> String {
    let outputs: String = outputs
        .iter()
        .map(|(identifier, href)| {
            format!(
                r#"
    <wps:Output>
      <ows:Identifier>{identifier}</ows:Identifier>
      <wps:Reference href="{}" mimeType="text/xml"/>
    </wps:Output>"#,
                href.replace('&', "&amp;")
            )
        })
        .collect();
    execute_response(
        None,
        "<wps:ProcessSucceeded>Process completed</wps:ProcessSucceeded>",
        &format!("\n  <wps:ProcessOutputs>{}\n  </wps:ProcessOutputs>", outputs),
    )
}

pub fn process_failed(code: &str, text: &str) -> String {
    execute_response(
        None,
        &format!(
            r#"<wps:ProcessFailed>
      <ows:ExceptionReport version="1.0.0">
        <ows:Exception exceptionCode="{code}"><ows:ExceptionText>{text}</ows:ExceptionText></ows:Exception>
      </ows:ExceptionReport>
    </wps:ProcessFailed>"#
        ),
        "",
    )
}

/// OWS 1.1 exception report with one entry per (code, locator, text).
pub fn exception_report(exceptions: &[(&str, Option<&str>, &str)]) -> String {
    let entries: String = exceptions
        .iter()
        .map(|(code, locator, text)| {
            let locator = locator
                .map(|l| format!(r#" locator="{}""#, l))
                .unwrap_or_default();
            format!(
                r#"
  <ows:Exception exceptionCode="{code}"{locator}>
    <ows:ExceptionText>{text}</ows:ExceptionText>
  </ows:Exception>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0" xml:lang="en">{entries}
</ows:ExceptionReport>"#
    )
}

pub fn describe_double_it() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wps:ProcessDescriptions {ROOT_NS} service="WPS" version="1.0.0" xml:lang="en">
  <ProcessDescription wps:processVersion="1" storeSupported="true" statusSupported="true">
    <ows:Identifier>DoubleIt</ows:Identifier>
    <ows:Title>Double a number</ows:Title>
    <DataInputs>
      <Input minOccurs="1" maxOccurs="1">
        <ows:Identifier>NumberToDouble</ows:Identifier>
        <ows:Title>Number to double</ows:Title>
        <LiteralData>
          <ows:DataType ows:reference="xs:integer">integer</ows:DataType>
          <ows:AnyValue/>
        </LiteralData>
      </Input>
    </DataInputs>
    <ProcessOutputs>
      <Output>
        <ows:Identifier>result</ows:Identifier>
        <ows:Title>Doubled number</ows:Title>
        <LiteralOutput><ows:DataType ows:reference="xs:integer">integer</ows:DataType></LiteralOutput>
      </Output>
    </ProcessOutputs>
  </ProcessDescription>
</wps:ProcessDescriptions>"#
    )
}

pub fn capabilities() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wps:Capabilities {ROOT_NS} service="WPS" version="1.0.0" xml:lang="en">
  <ows:ServiceIdentification>
    <ows:Title>Example processing service</ows:Title>
    <ows:ServiceType>WPS</ows:ServiceType>
    <ows:ServiceTypeVersion>1.0.0</ows:ServiceTypeVersion>
  </ows:ServiceIdentification>
  <ows:OperationsMetadata>
    <ows:Operation name="Execute">
      <ows:DCP><ows:HTTP>
        <ows:Get xlink:href="{SERVICE_URL}?"/>
        <ows:Post xlink:href="{SERVICE_URL}"/>
      </ows:HTTP></ows:DCP>
    </ows:Operation>
  </ows:OperationsMetadata>
  <wps:ProcessOfferings>
    <wps:Process wps:processVersion="1">
      <ows:Identifier>DoubleIt</ows:Identifier>
      <ows:Title>Double a number</ows:Title>
    </wps:Process>
  </wps:ProcessOfferings>
</wps:Capabilities>"#
    )
}
