//! Execution status vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a process run, named after the WPS status element that reports
/// it. `Exception` is reached when the service answers with an exception
/// report or a document that cannot be read as a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    ProcessAccepted,
    ProcessStarted,
    ProcessPaused,
    ProcessSucceeded,
    ProcessFailed,
    Exception,
}

impl ExecutionStatus {
    /// Status for a `wps:Status` child element name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ProcessAccepted" => Some(ExecutionStatus::ProcessAccepted),
            "ProcessStarted" => Some(ExecutionStatus::ProcessStarted),
            "ProcessPaused" => Some(ExecutionStatus::ProcessPaused),
            "ProcessSucceeded" => Some(ExecutionStatus::ProcessSucceeded),
            "ProcessFailed" => Some(ExecutionStatus::ProcessFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::ProcessAccepted => "ProcessAccepted",
            ExecutionStatus::ProcessStarted => "ProcessStarted",
            ExecutionStatus::ProcessPaused => "ProcessPaused",
            ExecutionStatus::ProcessSucceeded => "ProcessSucceeded",
            ExecutionStatus::ProcessFailed => "ProcessFailed",
            ExecutionStatus::Exception => "Exception",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::ProcessSucceeded
                | ExecutionStatus::ProcessFailed
                | ExecutionStatus::Exception
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for status in [
            ExecutionStatus::ProcessAccepted,
            ExecutionStatus::ProcessStarted,
            ExecutionStatus::ProcessPaused,
            ExecutionStatus::ProcessSucceeded,
            ExecutionStatus::ProcessFailed,
        ] {
            assert_eq!(ExecutionStatus::from_tag(status.as_str()), Some(status));
        }
        // Exception is never a status element.
        assert_eq!(ExecutionStatus::from_tag("Exception"), None);
        assert_eq!(ExecutionStatus::from_tag("ProcessRunning"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionStatus::ProcessSucceeded.is_terminal());
        assert!(ExecutionStatus::ProcessFailed.is_terminal());
        assert!(ExecutionStatus::Exception.is_terminal());
        assert!(!ExecutionStatus::ProcessAccepted.is_terminal());
        assert!(!ExecutionStatus::ProcessStarted.is_terminal());
        assert!(!ExecutionStatus::ProcessPaused.is_terminal());
    }
}
