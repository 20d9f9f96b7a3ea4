//! Wire event to structured request.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use http::header::COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BridgeError;

/// HTTP-triggered event as delivered by the host (payload format 2.0).
///
/// Only the fields the bridge reads are modeled; the full event stays
/// available through [`RequestAttributes::event`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(default)]
    pub raw_path: Option<String>,
    #[serde(default)]
    pub raw_query_string: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub cookies: Option<Vec<String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub request_context: Option<Value>,
}

impl WireEvent {
    /// `requestContext.http.method`, if present.
    pub fn method(&self) -> Option<&str> {
        self.request_context
            .as_ref()?
            .pointer("/http/method")?
            .as_str()
    }
}

/// Host-specific data carried along with a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestAttributes {
    pub path_parameters: Option<HashMap<String, String>>,
    /// The untouched wire event.
    pub event: Value,
    /// `requestContext` of the wire event, `{}` when absent.
    pub request_context: Value,
}

/// Framework-neutral HTTP request handed to request-shaped handlers.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub attributes: RequestAttributes,
}

impl StructuredRequest {
    /// Header value by case-insensitive name, multiple values joined with `", "`.
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<_> = self
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.attributes
            .path_parameters
            .as_ref()?
            .get(name)
            .map(String::as_str)
    }

    /// Body as text when it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Convert a wire event into a [`StructuredRequest`].
pub fn to_request(event: Value) -> Result<StructuredRequest, BridgeError> {
    let wire = WireEvent::deserialize(&event).map_err(|e| BridgeError::InvalidEvent(e.to_string()))?;

    let method_name = wire.method().unwrap_or("GET");
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|_| BridgeError::InvalidMethod(method_name.to_string()))?;

    let path = wire
        .raw_path
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());

    let body = decode_body(wire.body.as_deref(), wire.is_base64_encoded)?;
    let query = parse_query(wire.raw_query_string.as_deref().unwrap_or(""));
    let headers = copy_headers(wire.headers.as_ref(), wire.cookies.as_deref());

    let request_context = wire
        .request_context
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Ok(StructuredRequest {
        method,
        path,
        query,
        headers,
        body,
        attributes: RequestAttributes {
            path_parameters: wire.path_parameters,
            event,
            request_context,
        },
    })
}

fn decode_body(body: Option<&str>, is_base64_encoded: bool) -> Result<Vec<u8>, BridgeError> {
    match body {
        None | Some("") => Ok(Vec::new()),
        Some(encoded) if is_base64_encoded => Ok(BASE64_STANDARD.decode(encoded.trim())?),
        Some(text) => Ok(text.as_bytes().to_vec()),
    }
}

/// Form-encoded query parsing; a repeated key keeps its last value.
fn parse_query(raw: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

fn copy_headers(
    source: Option<&HashMap<String, String>>,
    cookies: Option<&[String]>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in source.into_iter().flatten() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(
                target: "lambda_runtime_bridge::bridge",
                "Dropping request header '{}' that is not valid HTTP",
                name
            ),
        }
    }

    // Payload 2.0 moves request cookies out of the headers.
    if let Some(cookies) = cookies.filter(|c| !c.is_empty())
        && !headers.contains_key(COOKIE)
        && let Ok(value) = HeaderValue::from_str(&cookies.join("; "))
    {
        headers.insert(COOKIE, value);
    }

    headers
}
