//! WPS service client.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ows_common::{is_exception_report, parse, parse_exception_report, Element};
use ows_http::{HttpTransport, Transport};
use tracing::{debug, info, instrument};

use crate::capabilities::WpsCapabilities;
use crate::config::ClientConfig;
use crate::error::{WpsError, WpsResult};
use crate::execution::{monitor_execution, Execution};
use crate::output::get_request;
use crate::process::{parse_process_descriptions, ProcessDescription};
use crate::request::{describe_process_params, get_capabilities_params, ExecuteRequest};
use crate::status::ExecutionStatus;

/// Client for one WPS 1.0.0 endpoint.
#[derive(Clone)]
pub struct WebProcessingService {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for WebProcessingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebProcessingService")
            .field("url", &self.config.url)
            .field("version", &self.config.version)
            .finish_non_exhaustive()
    }
}

impl WebProcessingService {
    pub fn new(url: impl Into<String>) -> WpsResult<Self> {
        Self::from_config(ClientConfig::new(url))
    }

    /// Client with a blocking HTTP transport built from `config.http`.
    pub fn from_config(config: ClientConfig) -> WpsResult<Self> {
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET the service URL with extra KVP parameters and parse the reply.
    /// Exception reports become [`WpsError::ServiceException`].
    fn fetch_document(&self, params: Vec<(String, String)>) -> WpsResult<Element> {
        let request = get_request(&self.config.url).query(params);
        let body = self.transport.fetch(&self.config.http.apply(request))?;
        let root = parse(&body)?;
        if is_exception_report(&root) {
            return Err(WpsError::ServiceException(parse_exception_report(&root)));
        }
        Ok(root)
    }

    #[instrument(skip(self), fields(url = %self.config.url))]
    pub fn get_capabilities(&self) -> WpsResult<WpsCapabilities> {
        let root = self.fetch_document(get_capabilities_params())?;
        let capabilities = WpsCapabilities::from_element(&root)?;
        info!(processes = capabilities.processes.len(), "Read WPS capabilities");
        Ok(capabilities)
    }

    /// Describe one process.
    pub fn describe_process(&self, identifier: &str) -> WpsResult<ProcessDescription> {
        self.describe_processes(&[identifier])?
            .into_iter()
            .find(|d| d.identifier == identifier)
            .ok_or_else(|| WpsError::Validation(format!("Service did not describe process '{}'", identifier)))
    }

    /// Describe several processes at once. `["ALL"]` describes every one.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub fn describe_processes(&self, identifiers: &[&str]) -> WpsResult<Vec<ProcessDescription>> {
        if identifiers.is_empty() || identifiers.iter().any(|id| id.trim().is_empty()) {
            return Err(WpsError::Validation("process identifier is empty".to_string()));
        }
        let root = self.fetch_document(describe_process_params(identifiers))?;
        let descriptions = parse_process_descriptions(&root)?;
        debug!(count = descriptions.len(), "Described processes");
        Ok(descriptions)
    }

    /// Validate and submit an execute request.
    ///
    /// The returned execution has the first response applied. Invalid
    /// requests fail before anything is sent.
    pub fn execute(&self, request: &ExecuteRequest) -> WpsResult<Execution> {
        let document = request.to_element()?;

        let mut execution = Execution::new(self.config.url.as_str(), Arc::clone(&self.transport))
            .with_http_config(self.config.http.clone())
            .with_version(self.config.version.as_str());
        if let Some(description) = &request.description {
            execution = execution.with_description(description.clone());
        }

        execution.submit_request(&document)?;
        Ok(execution)
    }

    /// [`monitor_execution`] with the configured poll interval.
    pub fn monitor(
        &self,
        execution: &mut Execution,
        download_to: Option<&Path>,
    ) -> WpsResult<ExecutionStatus> {
        monitor_execution(execution, self.config.poll_interval(), download_to)
    }
}
