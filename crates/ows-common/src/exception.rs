//! OWS ExceptionReport documents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::namespaces::is_ows;
use crate::xml::Element;

/// One `ows:Exception` entry of an exception report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwsException {
    /// `exceptionCode` attribute.
    pub code: Option<String>,
    pub locator: Option<String>,
    /// `ows:ExceptionText` children joined by newlines.
    pub text: String,
}

impl OwsException {
    pub fn new(code: Option<&str>, locator: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            locator: locator.map(str::to_string),
            text: text.into(),
        }
    }

    pub fn from_element(element: &Element) -> Self {
        let text = element
            .children_local("ExceptionText")
            .map(|t| t.text().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(element.attr("exceptionCode"), element.attr("locator"), text)
    }
}

impl fmt::Display for OwsException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code.as_deref().unwrap_or("NoApplicableCode"))?;
        if let Some(locator) = &self.locator {
            write!(f, " [{}]", locator)?;
        }
        if !self.text.is_empty() {
            write!(f, ": {}", self.text)?;
        }
        Ok(())
    }
}

/// True if `element` is an OWS (1.0 or 1.1) or unqualified ExceptionReport.
pub fn is_exception_report(element: &Element) -> bool {
    element.local_name() == "ExceptionReport" && element.namespace().map_or(true, is_ows)
}

/// All exceptions of a report, in document order.
pub fn parse_exception_report(element: &Element) -> Vec<OwsException> {
    element
        .children_local("Exception")
        .map(OwsException::from_element)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    const REPORT: &str = r#"<ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0">
  <ows:Exception exceptionCode="MissingParameterValue" locator="NumberToDouble">
    <ows:ExceptionText>Input NumberToDouble is required</ows:ExceptionText>
  </ows:Exception>
  <ows:Exception exceptionCode="NoApplicableCode"/>
</ows:ExceptionReport>"#;

    #[test]
    fn test_parse_report() {
        let root = parse(REPORT.as_bytes()).unwrap();
        assert!(is_exception_report(&root));

        let exceptions = parse_exception_report(&root);
        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[0].code.as_deref(), Some("MissingParameterValue"));
        assert_eq!(exceptions[0].locator.as_deref(), Some("NumberToDouble"));
        assert_eq!(exceptions[0].text, "Input NumberToDouble is required");
        assert_eq!(exceptions[1].locator, None);
        assert_eq!(exceptions[1].text, "");
    }

    #[test]
    fn test_ows_1_0_report_is_recognized() {
        let root = parse(br#"<ExceptionReport xmlns="http://www.opengis.net/ows"/>"#).unwrap();
        assert!(is_exception_report(&root));

        let other = parse(br#"<ExceptionReport xmlns="urn:other"/>"#).unwrap();
        assert!(!is_exception_report(&other));
    }

    #[test]
    fn test_display() {
        let e = OwsException::new(Some("E1"), Some("x"), "bad input");
        assert_eq!(e.to_string(), "E1 [x]: bad input");
        let e = OwsException::new(None, None, "");
        assert_eq!(e.to_string(), "NoApplicableCode");
    }
}
