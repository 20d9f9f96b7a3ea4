//! One unit of work handed out by the host.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::warn;
use serde::Serialize;
use serde_json::Value;

use super::headers;
use crate::error::ApiError;

/// Metadata the host sends alongside an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub request_id: String,
    /// Deadline in milliseconds since the Unix epoch.
    pub deadline_ms: Option<u64>,
    pub invoked_function_arn: String,
    pub trace_id: Option<String>,
}

impl Context {
    /// Wall-clock deadline for this invocation.
    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline_ms
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline().map(|deadline| {
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}

/// A fetched invocation. The request id is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    request_id: String,
    pub event: Value,
    pub context: Context,
}

impl Invocation {
    /// Build an invocation from lower-cased response headers and the raw body.
    ///
    /// Fails with a protocol error when the request id header is absent or
    /// empty. A body that is empty or not JSON becomes an empty object.
    pub fn from_parts(
        response_headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<Self, ApiError> {
        let request_id = response_headers
            .get(headers::REQUEST_ID)
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::protocol(format!("missing {} header", headers::REQUEST_ID))
            })?
            .to_string();

        let event = decode_event(&request_id, body);

        let context = Context {
            request_id: request_id.clone(),
            deadline_ms: response_headers
                .get(headers::DEADLINE_MS)
                .and_then(|ms| ms.trim().parse().ok()),
            invoked_function_arn: response_headers
                .get(headers::FUNCTION_ARN)
                .cloned()
                .unwrap_or_default(),
            trace_id: response_headers
                .get(headers::TRACE_ID)
                .filter(|id| !id.is_empty())
                .cloned(),
        };

        Ok(Self {
            request_id,
            event,
            context,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Top-level keys of an object event, for debug logging.
    pub fn event_keys(&self) -> Vec<&str> {
        self.event
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn decode_event(request_id: &str, body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Default::default());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Null) => Value::Object(Default::default()),
        Ok(event) => event,
        Err(e) => {
            warn!(
                target: "lambda_runtime_bridge::api",
                "Event body for {} is not valid JSON ({}), using an empty event",
                request_id,
                e
            );
            Value::Object(Default::default())
        }
    }
}
