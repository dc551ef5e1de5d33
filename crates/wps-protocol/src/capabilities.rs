//! WPS capabilities documents.

use ows_common::namespaces::{WPS_1_0_0, XLINK};
use ows_common::Element;
use serde::{Deserialize, Serialize};

use crate::error::{WpsError, WpsResult};
use crate::process::ProcessBrief;

/// An operation advertised in `ows:OperationsMetadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub get_urls: Vec<String>,
    pub post_urls: Vec<String>,
}

impl Operation {
    fn from_element(element: &Element) -> Self {
        let mut operation = Operation {
            name: element.attr("name").unwrap_or_default().to_string(),
            ..Self::default()
        };
        for http in element
            .children_local("DCP")
            .filter_map(|dcp| dcp.child_local("HTTP"))
        {
            for method in http.elements() {
                let Some(href) = method.attr_ns("href", XLINK).or_else(|| method.attr("href")) else {
                    continue;
                };
                match method.local_name() {
                    "Get" => operation.get_urls.push(href.to_string()),
                    "Post" => operation.post_urls.push(href.to_string()),
                    _ => {}
                }
            }
        }
        operation
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpsCapabilities {
    pub version: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub provider_name: Option<String>,
    pub operations: Vec<Operation>,
    pub processes: Vec<ProcessBrief>,
}

impl WpsCapabilities {
    pub fn from_element(root: &Element) -> WpsResult<Self> {
        if !root.is("Capabilities", Some(WPS_1_0_0)) {
            return Err(WpsError::UnexpectedDocument {
                expected: "wps:Capabilities".to_string(),
                found: root.local_name().to_string(),
            });
        }

        let identification = root.child_local("ServiceIdentification");
        let processes = match root.child_local("ProcessOfferings") {
            Some(offerings) => offerings
                .children_local("Process")
                .map(ProcessBrief::from_element)
                .collect::<WpsResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            version: root.attr("version").map(str::to_string),
            title: identification.and_then(|i| i.child_text("Title")),
            abstract_text: identification.and_then(|i| i.child_text("Abstract")),
            provider_name: root
                .child_local("ServiceProvider")
                .and_then(|p| p.child_text("ProviderName")),
            operations: root
                .child_local("OperationsMetadata")
                .map(|m| m.children_local("Operation").map(Operation::from_element).collect())
                .unwrap_or_default(),
            processes,
        })
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name.eq_ignore_ascii_case(name))
    }

    /// First POST endpoint advertised for Execute.
    pub fn execute_url(&self) -> Option<&str> {
        self.operation("Execute")
            .and_then(|o| o.post_urls.first())
            .map(String::as_str)
    }

    pub fn process(&self, identifier: &str) -> Option<&ProcessBrief> {
        self.processes.iter().find(|p| p.identifier == identifier)
    }
}
