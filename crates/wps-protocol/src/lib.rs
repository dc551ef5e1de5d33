//! OGC Web Processing Service 1.0.0 client.
//!
//! Supports:
//! - GetCapabilities and DescribeProcess (KVP GET)
//! - Execute requests with literal, complex, bounding box and WFS inputs
//! - Synchronous and asynchronous execution with status polling
//! - Inline outputs and downloads of referenced outputs

pub mod capabilities;
pub mod client;
pub mod config;
pub mod error;
pub mod execution;
pub mod input;
pub mod literal;
pub mod output;
pub mod process;
pub mod request;
pub mod response;
pub mod status;

pub use capabilities::{Operation, WpsCapabilities};
pub use client::WebProcessingService;
pub use config::ClientConfig;
pub use error::{WpsError, WpsResult};
pub use execution::{monitor_execution, Execution, ExecutionError};
pub use input::{
    ComplexDataInput, ExecuteInput, InputValue, RequestFragment, WfsFeatureCollection, WfsQuery,
};
pub use literal::{LiteralCastError, LiteralType, LiteralValue};
pub use output::{
    ComplexPayload, OutputData, OutputReference, OutputResult, RetrievedOutput,
};
pub use process::{
    AllowedValues, BoundingBoxDescription, ComplexDescription, DataDescription, DataKind, Format,
    InputDescriptor, LiteralDescription, MetadataLink, OutputDescriptor, ProcessBrief,
    ProcessDescription, ValueRange,
};
pub use request::{
    build_request, parse_execute_inputs, ExecuteMode, ExecuteRequest, OutputRequest,
    ResponseForm,
};
pub use response::{parse_response, parse_response_bytes, ExecuteResponse, ParsedResponse};
pub use status::ExecutionStatus;
