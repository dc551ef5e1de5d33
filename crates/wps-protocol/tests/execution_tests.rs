//! Execution life cycle against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use ows_http::{HttpError, HttpMethod};
use test_utils::{fixtures, init_tracing, RecordingTransport};
use wps_protocol::{
    monitor_execution, ClientConfig, ComplexDataInput, ExecuteInput, ExecuteMode, ExecuteRequest,
    ExecutionStatus, LiteralValue, OutputData, OutputRequest, RetrievedOutput, WebProcessingService,
    WpsError,
};

const STATUS_URL: &str = "http://wps.example.com/status/job-1.xml";

fn client(transport: &Arc<RecordingTransport>) -> WebProcessingService {
    init_tracing();
    WebProcessingService::with_transport(ClientConfig::new(fixtures::SERVICE_URL), transport.clone())
}

fn double_it() -> ExecuteRequest {
    ExecuteRequest::new("DoubleIt")
        .input(ExecuteInput::literal("NumberToDouble", "4"))
        .output(OutputRequest::new("result"))
        .mode(ExecuteMode::Async)
}

#[test]
fn test_double_it_scenario() {
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::process_started(Some(STATUS_URL), 50),
        fixtures::succeeded_literal("result", "8", Some("xs:integer")),
    ]));
    let wps = client(&transport);

    let mut execution = wps.execute(&double_it()).unwrap();
    assert_eq!(execution.status(), Some(ExecutionStatus::ProcessAccepted));
    assert_eq!(execution.status_location(), Some(STATUS_URL));
    assert_eq!(execution.process_identifier(), Some("DoubleIt"));
    assert!(!execution.is_complete().unwrap());

    execution.check_status(None, Duration::ZERO).unwrap();
    assert_eq!(execution.status(), Some(ExecutionStatus::ProcessStarted));
    assert_eq!(execution.percent_completed(), 50);
    assert!(!execution.is_complete().unwrap());

    execution.check_status(None, Duration::ZERO).unwrap();
    assert!(execution.is_complete().unwrap());
    assert!(execution.is_succeeded());
    assert_eq!(execution.percent_completed(), 100);

    let outputs = execution.get_output(Some("result"), None).unwrap();
    assert_eq!(
        outputs,
        vec![RetrievedOutput::Inline {
            identifier: "result".to_string(),
            data: OutputData::Literal(LiteralValue::Integer(8)),
        }]
    );
    // One POST and two status GETs; the inline output needed no fetch.
    assert_eq!(transport.call_count(), 3);

    let requests = transport.requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, fixtures::SERVICE_URL);
    let body = String::from_utf8(requests[0].body.clone().unwrap()).unwrap();
    assert!(body.contains("storeExecuteResponse=\"true\" status=\"true\""));
    assert!(body.contains("<wps:LiteralData>4</wps:LiteralData>"));
    assert_eq!(requests[1].method, HttpMethod::Get);
    assert_eq!(requests[1].url, STATUS_URL);
    assert_eq!(execution.last_request().map(<[u8]>::len), Some(body.len()));
}

#[test]
fn test_invalid_request_makes_no_calls() {
    let transport = Arc::new(RecordingTransport::new());
    let wps = client(&transport);

    let invalid = [
        ExecuteRequest::new(""),
        ExecuteRequest::new("p").input(ExecuteInput::literal("", "1")),
        ExecuteRequest::new("p").input(ExecuteInput::complex(
            "c",
            ComplexDataInput {
                payload: Some("<a/>".to_string()),
                href: Some("http://example.com/a.xml".to_string()),
                ..Default::default()
            },
        )),
        ExecuteRequest::new("p")
            .raw_output(OutputRequest::new("r"))
            .mode(ExecuteMode::Async),
        ExecuteRequest::new("p")
            .output(OutputRequest::new("r"))
            .output(OutputRequest::new("r")),
    ];
    for request in &invalid {
        assert!(
            matches!(wps.execute(request), Err(WpsError::Validation(_))),
            "{:?}",
            request
        );
    }
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn test_get_output_while_started_is_state_error() {
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::process_started(
        Some(STATUS_URL),
        20,
    )]));
    let execution = client(&transport).execute(&double_it()).unwrap();

    let errors_before = execution.errors().to_vec();
    match execution.get_output(None, None) {
        Err(WpsError::State { status, .. }) => assert_eq!(status, "ProcessStarted"),
        other => panic!("expected state error, got {:?}", other),
    }
    assert_eq!(execution.errors(), errors_before.as_slice());
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn test_get_output_after_failure_names_errors() {
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::process_failed(
        "NoApplicableCode",
        "division by zero",
    )]));
    let execution = client(&transport).execute(&double_it()).unwrap();
    assert!(execution.is_complete().unwrap());

    let err = execution.get_output(None, None).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("ProcessFailed"), "{}", message);
    assert!(message.contains("division by zero"), "{}", message);
}

#[test]
fn test_explicit_poll_url_overrides_and_is_kept() {
    let other = "http://wps.example.com/status/moved.xml";
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::process_started(None, 10),
        fixtures::process_started(None, 60),
    ]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    execution.check_status(Some(other), Duration::ZERO).unwrap();
    assert_eq!(execution.status_location(), Some(other));
    execution.check_status(None, Duration::ZERO).unwrap();

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls[1..], [other.to_string(), other.to_string()]);
    assert_eq!(execution.percent_completed(), 60);
}

#[test]
fn test_status_location_last_write_wins() {
    let second = "http://wps.example.com/status/job-1b.xml";
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::process_started(Some(second), 10),
        fixtures::process_started(None, 20),
    ]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    execution.check_status(None, Duration::ZERO).unwrap();
    assert_eq!(execution.status_location(), Some(second));
    execution.check_status(None, Duration::ZERO).unwrap();
    assert_eq!(execution.status_location(), Some(second));
    assert_eq!(transport.requests()[2].url, second);
}

#[test]
fn test_two_exception_report() {
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::exception_report(&[
        ("MissingParameterValue", Some("NumberToDouble"), "Input is required"),
        ("InvalidParameterValue", Some("mode"), "Unknown mode"),
    ])]));
    let execution = client(&transport).execute(&double_it()).unwrap();

    assert_eq!(execution.status(), Some(ExecutionStatus::Exception));
    assert!(execution.is_complete().unwrap());
    assert_eq!(execution.errors().len(), 2);
    assert_eq!(execution.errors()[0].code.as_deref(), Some("MissingParameterValue"));
    assert_eq!(execution.errors()[1].locator.as_deref(), Some("mode"));
}

#[test]
fn test_check_status_is_idempotent_after_terminal() {
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::succeeded_literal(
        "result", "8", None,
    )]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();
    let outputs = execution.process_outputs().to_vec();

    for _ in 0..3 {
        execution.check_status(None, Duration::ZERO).unwrap();
    }
    assert_eq!(transport.call_count(), 1);
    assert_eq!(execution.status(), Some(ExecutionStatus::ProcessSucceeded));
    assert_eq!(execution.process_outputs(), outputs.as_slice());
    assert!(execution.errors().is_empty());
}

#[test]
fn test_unrecognized_response_is_format_error() {
    let transport = Arc::new(RecordingTransport::with_responses([
        "<html><body>Bad gateway</body></html>",
    ]));
    let execution = client(&transport).execute(&double_it()).unwrap();

    assert_eq!(execution.status(), Some(ExecutionStatus::Exception));
    assert_eq!(execution.errors().len(), 1);
    assert_eq!(execution.errors()[0].code.as_deref(), Some("FormatError"));
}

#[test]
fn test_transport_failure_propagates() {
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::process_accepted(
        STATUS_URL,
    )]));
    transport.push_failure("connection reset");
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    let err = execution.check_status(None, Duration::ZERO).unwrap_err();
    assert!(matches!(err, WpsError::Transport(HttpError::Connection { .. })));
    assert_eq!(execution.status(), Some(ExecutionStatus::ProcessAccepted));
}

#[test]
fn test_literal_cast_failure_leaves_execution_unchanged() {
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::succeeded_literal("result", "eight", Some("xs:integer")),
    ]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    let err = execution.check_status(None, Duration::ZERO).unwrap_err();
    assert!(matches!(err, WpsError::Value(_)));
    assert_eq!(execution.status(), Some(ExecutionStatus::ProcessAccepted));
    assert!(execution.process_outputs().is_empty());
}

#[test]
fn test_monitor_execution_runs_to_completion() {
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::process_started(None, 10),
        fixtures::process_paused(None),
        fixtures::process_started(None, 90),
        fixtures::succeeded_literal("result", "8", Some("integer")),
    ]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    let status = monitor_execution(&mut execution, Duration::ZERO, None).unwrap();
    assert_eq!(status, ExecutionStatus::ProcessSucceeded);
    assert_eq!(transport.call_count(), 5);
    assert_eq!(transport.remaining(), 0);
}

#[test]
fn test_monitor_execution_reports_failure() {
    let transport = Arc::new(RecordingTransport::with_responses([
        fixtures::process_accepted(STATUS_URL),
        fixtures::process_failed("NoApplicableCode", "out of memory"),
    ]));
    let mut execution = client(&transport).execute(&double_it()).unwrap();

    let status = monitor_execution(&mut execution, Duration::ZERO, None).unwrap();
    assert_eq!(status, ExecutionStatus::ProcessFailed);
    assert_eq!(execution.errors()[0].text, "out of memory");
}

#[test]
fn test_referenced_outputs_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::succeeded_references(
        &[
            ("map", "http://wps.example.com/outputs/map.xml"),
            ("report", "http://wps.example.com/retrieve?id=report-7.txt&format=text"),
        ],
    )]));
    transport.push_response("<map/>");
    transport.push_response("all good");
    let execution = client(&transport).execute(&double_it()).unwrap();

    let outputs = execution.get_output(None, Some(dir.path())).unwrap();
    assert_eq!(outputs.len(), 2);
    match &outputs[1] {
        RetrievedOutput::Written { identifier, path, bytes } => {
            assert_eq!(identifier, "report");
            assert_eq!(path, &dir.path().join("report-7.txt"));
            assert_eq!(*bytes, 8);
        }
        other => panic!("expected written output, got {:?}", other),
    }
    assert_eq!(
        std::fs::read_to_string(dir.path().join("map.xml")).unwrap(),
        "<map/>"
    );

    let requests = transport.requests();
    assert_eq!(requests[2].url, "http://wps.example.com/retrieve");
    assert_eq!(
        requests[2].query,
        vec![
            ("id".to_string(), "report-7.txt".to_string()),
            ("format".to_string(), "text".to_string())
        ]
    );
}

#[test]
fn test_single_output_to_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("custom-name.gml");
    let transport = Arc::new(RecordingTransport::with_responses([fixtures::succeeded_references(
        &[
            ("map", "http://wps.example.com/outputs/map.xml"),
            ("other", "http://wps.example.com/outputs/other.xml"),
        ],
    )]));
    transport.push_response("<gml/>");
    let execution = client(&transport).execute(&double_it()).unwrap();

    // Two referenced outputs cannot share one file.
    assert!(matches!(
        execution.get_output(None, Some(target.as_path())),
        Err(WpsError::Validation(_))
    ));
    assert_eq!(transport.call_count(), 1);

    let outputs = execution.get_output(Some("map"), Some(target.as_path())).unwrap();
    assert!(matches!(&outputs[0], RetrievedOutput::Written { path, .. } if path == &target));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "<gml/>");
}
