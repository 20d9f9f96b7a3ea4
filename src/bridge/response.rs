//! Structured response to wire result.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use http::header::{CONTENT_TYPE, IntoHeaderName, SET_COOKIE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// Framework-neutral HTTP response produced by request-shaped handlers.
///
/// Headers added with [`with_added_header`](Self::with_added_header) keep
/// every value in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl StructuredResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Plain-text response with a `text/plain; charset=utf-8` content type.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
            .with_body(body.into())
    }

    /// JSON response with an `application/json` content type.
    pub fn json<T: Serialize + ?Sized>(
        status: StatusCode,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(serde_json::to_vec(value)?))
    }

    /// Replace every value of `name`.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a value to `name`, keeping the ones already present.
    pub fn with_added_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Result shape the host expects for HTTP-triggered invocations.
///
/// `headers` is a map so it always serializes as a JSON object, `{}` when
/// empty, never `[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResult {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
}

/// A body is binary when it is non-empty and holds a NUL byte or is not UTF-8.
pub fn is_binary(body: &[u8]) -> bool {
    !body.is_empty() && (body.contains(&0) || std::str::from_utf8(body).is_err())
}

/// Convert a [`StructuredResponse`] into a [`WireResult`].
pub fn from_response(response: StructuredResponse) -> WireResult {
    let StructuredResponse {
        status,
        headers,
        body,
    } = response;

    let binary = is_binary(&body);
    let body = if binary {
        BASE64_STANDARD.encode(&body)
    } else {
        // Not binary implies valid UTF-8.
        String::from_utf8(body).unwrap_or_default()
    };

    let mut flattened = BTreeMap::new();
    for name in headers.keys() {
        if name == SET_COOKIE {
            continue;
        }
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        flattened.insert(name.as_str().to_string(), joined);
    }

    let cookies: Vec<String> = headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();

    WireResult {
        status_code: status.as_u16(),
        headers: flattened,
        body,
        is_base64_encoded: binary,
        cookies: (!cookies.is_empty()).then_some(cookies),
    }
}
