//! Header names used by the invocation protocol and helpers to read them
//! case-insensitively.

use std::collections::HashMap;

use http::HeaderMap;

pub const REQUEST_ID: &str = "lambda-runtime-aws-request-id";
pub const DEADLINE_MS: &str = "lambda-runtime-deadline-ms";
pub const FUNCTION_ARN: &str = "lambda-runtime-invoked-function-arn";
pub const TRACE_ID: &str = "lambda-runtime-trace-id";
pub const FUNCTION_ERROR_TYPE: &str = "lambda-runtime-function-error-type";

/// Value sent in [`FUNCTION_ERROR_TYPE`] for every reported failure.
pub const UNHANDLED: &str = "Unhandled";

/// Parse a raw CRLF-separated header block into a lower-cased name/value map.
///
/// Lines without a colon (the status line, the blank terminator) are
/// skipped. Only the first colon splits, so values may contain colons.
/// A repeated name keeps its last value.
pub fn parse_header_block(raw: &str) -> HashMap<String, String> {
    raw.split("\r\n")
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
        .collect()
}

/// Flatten an [`HeaderMap`] into the same shape as [`parse_header_block`].
///
/// Values that are not valid UTF-8 are converted lossily.
pub fn to_lowercase_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).trim().to_string(),
            )
        })
        .collect()
}
