//! Client for the host's invocation protocol.
//!
//! Three calls against `http://{endpoint}/2018-06-01/runtime`:
//! - `GET /invocation/next` long-polls for work and never times out
//! - `POST /invocation/{id}/response` must be answered with 202
//! - `POST /invocation/{id}/error` is best-effort

pub mod error_report;
pub mod headers;
mod invocation;

pub use error_report::{ErrorReport, StackFrame, parse_backtrace};
pub use headers::parse_header_block;
pub use invocation::{Context, Invocation};

use std::time::Duration;

use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;

/// Path prefix of the invocation protocol version this client speaks.
pub const API_PATH: &str = "2018-06-01/runtime";

/// Timeout for posting results and error reports when none is configured.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything outside RFC 3986 unreserved characters is escaped in a request id.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const LOG_TARGET: &str = "lambda_runtime_bridge::api";

/// The host side of the invocation loop.
pub trait RuntimeApi {
    /// Block until the host hands out the next invocation.
    fn next_invocation(&self) -> Result<Invocation, ApiError>;

    /// Deliver a successful result. Strings are sent verbatim, anything else as JSON.
    fn send_response(&self, request_id: &str, payload: &Value) -> Result<(), ApiError>;

    /// Report a failed invocation. Failures of this call are not propagated.
    fn send_error(&self, request_id: &str, report: &ErrorReport);
}

/// Blocking HTTP implementation of [`RuntimeApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    send_timeout: Duration,
}

impl ApiClient {
    /// Create a client for `endpoint` (`host:port`).
    ///
    /// The underlying client has no overall timeout so the long poll can wait
    /// indefinitely; result and error posts use `send_timeout`.
    pub fn new(endpoint: &str, send_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(&format!("http://{}/{}", endpoint.trim(), API_PATH))
            .map_err(|e| ApiError::transport(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(None::<Duration>)
            .no_proxy()
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            send_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    fn invocation_url(&self, request_id: &str, action: &str) -> String {
        format!(
            "{}/invocation/{}/{}",
            self.base_url,
            utf8_percent_encode(request_id, PATH_SEGMENT),
            action
        )
    }
}

impl RuntimeApi for ApiClient {
    fn next_invocation(&self) -> Result<Invocation, ApiError> {
        let url = format!("{}/invocation/next", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ApiError::transport(format!("failed to get next invocation: {}", e)))?;

        let status = response.status();
        let response_headers = headers::to_lowercase_map(response.headers());
        let body = response
            .bytes()
            .map_err(|e| ApiError::transport(format!("failed to read invocation body: {}", e)))?;

        if status != StatusCode::OK {
            return Err(ApiError::unexpected_status(
                "failed to get next invocation",
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        Invocation::from_parts(&response_headers, &body)
    }

    fn send_response(&self, request_id: &str, payload: &Value) -> Result<(), ApiError> {
        let body = match payload {
            Value::String(raw) => raw.clone(),
            other => serde_json::to_string(other)
                .map_err(|e| ApiError::transport(format!("failed to encode response: {}", e)))?,
        };

        let response = self
            .client
            .post(self.invocation_url(request_id, "response"))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.send_timeout)
            .body(body)
            .send()
            .map_err(|e| ApiError::transport(format!("failed to send response: {}", e)))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let text = response.text().unwrap_or_default();
            return Err(ApiError::unexpected_status(
                "failed to send response",
                status.as_u16(),
                text,
            ));
        }
        Ok(())
    }

    fn send_error(&self, request_id: &str, report: &ErrorReport) {
        let body = match serde_json::to_string(report) {
            Ok(body) => body,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to encode error report: {}", e);
                return;
            }
        };

        let result = self
            .client
            .post(self.invocation_url(request_id, "error"))
            .header(CONTENT_TYPE, "application/json")
            .header(headers::FUNCTION_ERROR_TYPE, headers::UNHANDLED)
            .timeout(self.send_timeout)
            .body(body)
            .send();

        match result {
            Ok(response) if response.status() != StatusCode::ACCEPTED => {
                debug!(
                    target: LOG_TARGET,
                    "Host answered error report for {} with HTTP {}",
                    request_id,
                    response.status()
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "Failed to send error report for {}: {}",
                    request_id,
                    e
                );
            }
        }
    }
}
