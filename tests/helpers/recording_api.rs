//! In-memory `RuntimeApi` that records every call the loop makes.

// These methods are shared across multiple test binaries but not all tests use every method.
// Allow dead_code to suppress per-binary warnings.
#![allow(dead_code)]

use lambda_runtime_bridge::api::{ErrorReport, Invocation, RuntimeApi, headers};
use lambda_runtime_bridge::error::ApiError;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// Build an invocation the way the client would from host headers.
pub fn invocation(request_id: &str, event: Value) -> Invocation {
    invocation_with_trace(request_id, event, None)
}

pub fn invocation_with_trace(request_id: &str, event: Value, trace_id: Option<&str>) -> Invocation {
    let mut response_headers = HashMap::from([
        (headers::REQUEST_ID.to_string(), request_id.to_string()),
        (headers::DEADLINE_MS.to_string(), "4102444800000".to_string()),
        (
            headers::FUNCTION_ARN.to_string(),
            "arn:aws:lambda:us-east-1:123456789012:function:test".to_string(),
        ),
    ]);
    if let Some(trace_id) = trace_id {
        response_headers.insert(headers::TRACE_ID.to_string(), trace_id.to_string());
    }
    let body = serde_json::to_vec(&event).expect("event serializes");
    Invocation::from_parts(&response_headers, &body).expect("valid invocation")
}

/// Scripted host. Fetches pop from a queue; an empty queue fails the fetch.
#[derive(Default)]
pub struct RecordingApi {
    pending: RefCell<VecDeque<Result<Invocation, ApiError>>>,
    fetches: Cell<usize>,
    responses: RefCell<Vec<(String, Value)>>,
    errors: RefCell<Vec<(String, ErrorReport)>>,
    reject_responses: Cell<bool>,
}

impl RecordingApi {
    pub fn new(invocations: Vec<Invocation>) -> Self {
        Self {
            pending: RefCell::new(invocations.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    /// Answer every result post with a transport failure.
    pub fn rejecting_responses(self) -> Self {
        self.reject_responses.set(true);
        self
    }

    /// Queue a fetch failure after the invocations already queued.
    pub fn then_fail(self, error: ApiError) -> Self {
        self.pending.borrow_mut().push_back(Err(error));
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }

    pub fn responses(&self) -> Vec<(String, Value)> {
        self.responses.borrow().clone()
    }

    pub fn errors(&self) -> Vec<(String, ErrorReport)> {
        self.errors.borrow().clone()
    }
}

impl RuntimeApi for RecordingApi {
    fn next_invocation(&self) -> Result<Invocation, ApiError> {
        self.fetches.set(self.fetches.get() + 1);
        self.pending
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::transport("connection refused")))
    }

    fn send_response(&self, request_id: &str, payload: &Value) -> Result<(), ApiError> {
        if self.reject_responses.get() {
            return Err(ApiError::unexpected_status(
                "failed to send response",
                413,
                "payload too large".to_string(),
            ));
        }
        self.responses
            .borrow_mut()
            .push((request_id.to_string(), payload.clone()));
        Ok(())
    }

    fn send_error(&self, request_id: &str, report: &ErrorReport) {
        self.errors
            .borrow_mut()
            .push((request_id.to_string(), report.clone()));
    }
}
