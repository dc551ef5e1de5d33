//! Scripted transport that records every request.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;
use ows_http::{FetchRequest, HttpError, HttpResult, Transport};

enum Scripted {
    Body(Bytes),
    Failure(String),
}

/// Replays queued responses in order and keeps the requests it was given.
///
/// Running out of responses is a connection error, so a test that makes an
/// unexpected call fails loudly.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers with `bodies` in order.
    pub fn with_responses<I, B>(bodies: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let transport = Self::new();
        for body in bodies {
            transport.push_response(body);
        }
        transport
    }

    pub fn push_response(&self, body: impl Into<Bytes>) {
        self.lock_responses().push_back(Scripted::Body(body.into()));
    }

    /// Queue a network failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_responses().push_back(Scripted::Failure(message.into()));
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.lock_responses().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for RecordingTransport {
    fn fetch(&self, request: &FetchRequest) -> HttpResult<Bytes> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match self.lock_responses().pop_front() {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Failure(message)) => Err(HttpError::Connection {
                url: request.url.clone(),
                message,
            }),
            None => Err(HttpError::Connection {
                url: request.url.clone(),
                message: "no scripted response left".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_and_records() {
        let transport = RecordingTransport::with_responses(["first", "second"]);
        assert_eq!(transport.fetch(&FetchRequest::get("http://a")).unwrap(), "first");
        assert_eq!(
            transport.fetch(&FetchRequest::post("http://b", "<x/>")).unwrap(),
            "second"
        );
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.requests()[1].url, "http://b");
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_failures_and_exhaustion() {
        let transport = RecordingTransport::new();
        transport.push_failure("refused");
        assert!(matches!(
            transport.fetch(&FetchRequest::get("http://a")),
            Err(HttpError::Connection { .. })
        ));
        assert!(transport.fetch(&FetchRequest::get("http://a")).is_err());
        assert_eq!(transport.call_count(), 2);
    }
}
