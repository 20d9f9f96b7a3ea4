//! Conversion between the host's HTTP wire format and structured messages.
//!
//! Incoming events become a [`StructuredRequest`] with decoded body, parsed
//! query and case-insensitive headers. A [`StructuredResponse`] goes back out
//! as a [`WireResult`] with lower-cased header names, `Set-Cookie` values
//! split into `cookies`, and binary bodies base64-encoded.

mod request;
mod response;

pub use request::{RequestAttributes, StructuredRequest, WireEvent, to_request};
pub use response::{StructuredResponse, WireResult, from_response, is_binary};
