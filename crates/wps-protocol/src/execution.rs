//! Execution life cycle: submit, poll, apply status documents, fetch outputs.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ows_common::{Element, Namespaces, OwsException};
use ows_http::{FetchRequest, HttpConfig, Transport};
use tracing::{debug, info, instrument, warn};

use crate::error::{WpsError, WpsResult};
use crate::output::{
    derive_filename, get_request, retrieve_data, target_path, write_to_disk, OutputData,
    OutputResult, RetrievedOutput,
};
use crate::process::{ProcessBrief, ProcessDescription};
use crate::request::{OutputRequest, WPS_VERSION};
use crate::response::{parse_response_bytes, ExecuteResponse, ParsedResponse, FORMAT_ERROR_CODE};
use crate::status::ExecutionStatus;

/// A server-reported exception recorded on an execution.
pub type ExecutionError = OwsException;

/// One process run on a WPS server.
///
/// Status documents are folded in with [`apply`](Self::apply). Once the
/// status is terminal nothing changes it again.
pub struct Execution {
    url: String,
    version: String,
    process_identifier: Option<String>,
    transport: Arc<dyn Transport>,
    http: HttpConfig,
    description: Option<ProcessDescription>,

    status: Option<ExecutionStatus>,
    percent_completed: u8,
    status_message: Option<String>,
    status_location: Option<String>,
    service_instance: Option<String>,
    creation_time: Option<DateTime<Utc>>,
    process: Option<ProcessBrief>,
    data_inputs: Vec<OutputResult>,
    output_definitions: Vec<OutputRequest>,
    process_outputs: Vec<OutputResult>,
    errors: Vec<ExecutionError>,

    request: Option<Vec<u8>>,
    response: Option<Bytes>,
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("url", &self.url)
            .field("process_identifier", &self.process_identifier)
            .field("status", &self.status)
            .field("percent_completed", &self.percent_completed)
            .field("status_location", &self.status_location)
            .field("process_outputs", &self.process_outputs.len())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Execution {
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            version: WPS_VERSION.to_string(),
            process_identifier: None,
            transport,
            http: HttpConfig::default(),
            description: None,
            status: None,
            percent_completed: 0,
            status_message: None,
            status_location: None,
            service_instance: None,
            creation_time: None,
            process: None,
            data_inputs: Vec::new(),
            output_definitions: Vec::new(),
            process_outputs: Vec::new(),
            errors: Vec::new(),
            request: None,
            response: None,
        }
    }

    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Literal outputs without a `dataType` are typed from this description.
    pub fn with_description(mut self, description: ProcessDescription) -> Self {
        self.process_identifier = Some(description.identifier.clone());
        self.description = Some(description);
        self
    }

    // === Accessors ===

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn process_identifier(&self) -> Option<&str> {
        self.process_identifier.as_deref()
    }

    /// `None` until the first response has been applied.
    pub fn status(&self) -> Option<ExecutionStatus> {
        self.status
    }

    pub fn percent_completed(&self) -> u8 {
        self.percent_completed
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn status_location(&self) -> Option<&str> {
        self.status_location.as_deref()
    }

    pub fn service_instance(&self) -> Option<&str> {
        self.service_instance.as_deref()
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    pub fn process(&self) -> Option<&ProcessBrief> {
        self.process.as_ref()
    }

    pub fn data_inputs(&self) -> &[OutputResult] {
        &self.data_inputs
    }

    pub fn output_definitions(&self) -> &[OutputRequest] {
        &self.output_definitions
    }

    pub fn process_outputs(&self) -> &[OutputResult] {
        &self.process_outputs
    }

    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    /// The last request document sent.
    pub fn last_request(&self) -> Option<&[u8]> {
        self.request.as_deref()
    }

    /// The last raw response received.
    pub fn last_response(&self) -> Option<&Bytes> {
        self.response.as_ref()
    }

    // === State ===

    /// True once the run has ended, successfully or not.
    ///
    /// Accepted, started and paused runs are not complete. Asking before any
    /// response has been applied is a state error.
    pub fn is_complete(&self) -> WpsResult<bool> {
        match self.status {
            Some(status) => Ok(status.is_terminal()),
            None => Err(self.state_error("Execution status is not known yet")),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == Some(ExecutionStatus::ProcessSucceeded)
    }

    fn is_terminal(&self) -> bool {
        self.status.map_or(false, |s| s.is_terminal())
    }

    fn state_error(&self, message: &str) -> WpsError {
        WpsError::State {
            status: self
                .status
                .map_or_else(|| "unset".to_string(), |s| s.to_string()),
            message: message.to_string(),
            errors: self.errors.clone(),
        }
    }

    /// Fold a parsed response into this execution. No network access.
    pub fn apply(&mut self, parsed: ParsedResponse) {
        if self.is_terminal() {
            debug!(status = ?self.status, "Execution is terminal; ignoring response");
            return;
        }

        match parsed {
            ParsedResponse::Execute(response) => self.apply_execute(*response),
            ParsedResponse::Exception(errors) => {
                // The first exception sets the status; later reports only
                // accumulate errors. A run already in progress keeps its status.
                if self.status.is_none() {
                    self.status = Some(ExecutionStatus::Exception);
                }
                warn!(count = errors.len(), "Service returned an exception report");
                self.errors.extend(errors);
            }
            ParsedResponse::Unrecognized(message) => {
                self.status = Some(ExecutionStatus::Exception);
                self.errors
                    .push(OwsException::new(Some(FORMAT_ERROR_CODE), None, message));
            }
        }
    }

    fn apply_execute(&mut self, response: ExecuteResponse) {
        if self.status != Some(response.status) {
            info!(
                from = ?self.status,
                to = %response.status,
                "Execution status changed"
            );
        }
        self.status = Some(response.status);

        if let Some(location) = response.status_location {
            self.status_location = Some(location);
        }
        if let Some(instance) = response.service_instance {
            self.service_instance = Some(instance);
        }
        if let Some(percent) = response.percent_completed {
            self.percent_completed = percent;
        }
        self.status_message = response.status_message;
        if response.creation_time.is_some() {
            self.creation_time = response.creation_time;
        }
        if let Some(process) = response.process {
            if self.process_identifier.is_none() {
                self.process_identifier = Some(process.identifier.clone());
            }
            self.process = Some(process);
        }

        if let Some(inputs) = response.data_inputs {
            self.data_inputs = inputs;
        }
        if let Some(definitions) = response.output_definitions {
            self.output_definitions = definitions;
        }
        if let Some(outputs) = response.process_outputs {
            self.process_outputs = outputs;
        }
        self.errors.extend(response.errors);
    }

    fn receive(&mut self, body: Bytes) -> WpsResult<()> {
        let parsed = parse_response_bytes(&body, self.description.as_ref())?;
        self.response = Some(body);
        self.apply(parsed);
        Ok(())
    }

    // === Network ===

    /// POST an execute document to the service and apply the reply.
    #[instrument(skip(self, document), fields(url = %self.url))]
    pub fn submit_request(&mut self, document: &Element) -> WpsResult<()> {
        let body = document.to_bytes(Namespaces::ogc())?;
        if let Some(identifier) = document.child_text("Identifier") {
            self.process_identifier = Some(identifier);
        }
        self.request = Some(body.clone());

        info!(process = ?self.process_identifier, "Submitting execute request");
        let request = self.http.apply(FetchRequest::post(self.url.as_str(), body));
        let response = self.transport.fetch(&request)?;
        self.receive(response)
    }

    /// Poll the status location once and apply the result.
    ///
    /// `poll_url` replaces the stored status location. Sleeps for `sleep`
    /// afterwards unless the run has ended. A terminal execution is left
    /// untouched and nothing is fetched.
    #[instrument(skip(self), fields(process = ?self.process_identifier))]
    pub fn check_status(&mut self, poll_url: Option<&str>, sleep: Duration) -> WpsResult<()> {
        if let Some(url) = poll_url {
            self.status_location = Some(url.to_string());
        }
        if self.is_terminal() {
            debug!(status = ?self.status, "Execution already complete; not polling");
            return Ok(());
        }

        let location = match &self.status_location {
            Some(location) => location.clone(),
            None => return Err(self.state_error("No status location to poll")),
        };

        debug!(%location, "Checking execution status");
        let response = self.transport.fetch(&self.http.apply(get_request(&location)))?;
        self.receive(response)?;

        if !self.is_terminal() {
            debug!(
                percent = self.percent_completed,
                sleep_secs = sleep.as_secs_f64(),
                "Execution still running"
            );
            thread::sleep(sleep);
        }
        Ok(())
    }

    /// Outputs of a succeeded run.
    ///
    /// Inline outputs are returned as they are. Referenced outputs are
    /// downloaded: into `destination` if it is a directory, to `destination`
    /// itself otherwise, or to a derived file name in the working directory.
    pub fn get_output(
        &self,
        identifier: Option<&str>,
        destination: Option<&Path>,
    ) -> WpsResult<Vec<RetrievedOutput>> {
        if !self.is_succeeded() {
            return Err(self.state_error("Outputs are only available after ProcessSucceeded"));
        }

        let selected: Vec<&OutputResult> = match identifier {
            Some(id) => {
                let output = self
                    .process_outputs
                    .iter()
                    .find(|o| o.identifier == id)
                    .ok_or_else(|| WpsError::Validation(format!("No output named '{}'", id)))?;
                if output.data.is_none() {
                    return Err(WpsError::Validation(format!("Output '{}' carries no data", id)));
                }
                vec![output]
            }
            None => self.process_outputs.iter().filter(|o| o.data.is_some()).collect(),
        };

        let referenced = selected.iter().filter(|o| o.reference().is_some()).count();
        if let Some(path) = destination {
            if referenced > 1 && !path.is_dir() {
                return Err(WpsError::Validation(format!(
                    "{} referenced outputs cannot all be written to {}",
                    referenced,
                    path.display()
                )));
            }
        }

        let mut retrieved = Vec::with_capacity(selected.len());
        for output in selected {
            match &output.data {
                Some(OutputData::Reference(reference)) => {
                    let data = retrieve_data(reference, self.transport.as_ref(), &self.http)?;
                    let filename = derive_filename(&reference.href, &output.identifier);
                    let path = target_path(destination, &filename);
                    let bytes = write_to_disk(&path, &data)?;
                    retrieved.push(RetrievedOutput::Written {
                        identifier: output.identifier.clone(),
                        path,
                        bytes,
                    });
                }
                Some(data) => retrieved.push(RetrievedOutput::Inline {
                    identifier: output.identifier.clone(),
                    data: data.clone(),
                }),
                None => {}
            }
        }
        Ok(retrieved)
    }
}

/// Poll until the run ends, then fetch the outputs into `download_to` if it
/// succeeded, or log the collected errors if it did not.
pub fn monitor_execution(
    execution: &mut Execution,
    sleep: Duration,
    download_to: Option<&Path>,
) -> WpsResult<ExecutionStatus> {
    while !execution.is_complete()? {
        execution.check_status(None, sleep)?;
    }

    let status = execution.status.unwrap_or(ExecutionStatus::Exception);
    if execution.is_succeeded() {
        info!(process = ?execution.process_identifier, "Execution succeeded");
        if let Some(destination) = download_to {
            for output in execution.get_output(None, Some(destination))? {
                match output {
                    RetrievedOutput::Written { identifier, path, bytes } => {
                        info!(%identifier, path = %path.display(), bytes, "Output saved")
                    }
                    RetrievedOutput::Inline { identifier, .. } => {
                        info!(%identifier, "Inline output")
                    }
                }
            }
        }
    } else {
        warn!(%status, errors = execution.errors.len(), "Execution did not succeed");
        for error in &execution.errors {
            warn!(%error, "Execution error");
        }
    }
    Ok(status)
}
