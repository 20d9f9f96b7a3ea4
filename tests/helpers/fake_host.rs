//! Fake invocation host for integration tests.
//!
//! Serves a fixed script of HTTP/1.1 responses over a loopback
//! `TcpListener`, one connection per response, and records every request it
//! receives. Once the script is exhausted the listener is dropped, so any
//! further request from the runtime fails to connect.

// These methods are shared across multiple test binaries but not all tests use every method.
// Allow dead_code to suppress per-binary warnings.
#![allow(dead_code)]

use lambda_runtime_bridge::api::headers;
use lambda_runtime_bridge::api::parse_header_block;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Deadline header value far enough in the future for any test.
pub const FAR_DEADLINE_MS: &str = "4102444800000";

/// Canned reply for one request.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    delay: Duration,
}

impl CannedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    /// 200 reply to `GET /invocation/next` carrying `event`.
    pub fn invocation(request_id: &str, event: &Value) -> Self {
        Self::new(200)
            .with_header("Lambda-Runtime-Aws-Request-Id", request_id)
            .with_header("Lambda-Runtime-Deadline-Ms", FAR_DEADLINE_MS)
            .with_header(
                "Lambda-Runtime-Invoked-Function-Arn",
                "arn:aws:lambda:us-east-1:123456789012:function:test",
            )
            .with_header("Content-Type", "application/json")
            .with_body(event.to_string())
    }

    /// 202 reply to a result or error post.
    pub fn accepted() -> Self {
        Self::new(202)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"status":"OK"}"#)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Wait before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn write_to(&self, stream: &mut TcpStream) -> std::io::Result<()> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n\r\n");
        out.push_str(&self.body);
        stream.write_all(out.as_bytes())?;
        stream.flush()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        410 => "Gone",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A request as the fake host saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }

    pub fn is_error_report(&self) -> bool {
        self.path.ends_with("/error")
            && self.header(headers::FUNCTION_ERROR_TYPE) == Some(headers::UNHANDLED)
    }
}

pub struct FakeHost {
    endpoint: String,
    handle: JoinHandle<Vec<RecordedRequest>>,
}

impl FakeHost {
    /// Start serving `script` on an ephemeral loopback port.
    pub fn serve(script: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake host");
        let endpoint = listener
            .local_addr()
            .expect("Failed to read fake host address")
            .to_string();

        let handle = thread::spawn(move || {
            let mut recorded = Vec::new();
            for canned in script {
                let (mut stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let Some(request) = read_request(&stream) else {
                    continue;
                };
                recorded.push(request);
                thread::sleep(canned.delay);
                // The client may have given up already; that is the point of a delay.
                let _ = canned.write_to(&mut stream);
            }
            recorded
        });

        Self { endpoint, handle }
    }

    /// `host:port` to hand to the runtime.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wait for the script to finish and return every recorded request.
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().expect("fake host thread panicked")
    }
}

/// An endpoint nothing listens on.
pub fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe listener");
    let addr = listener
        .local_addr()
        .expect("Failed to read probe address")
        .to_string();
    drop(listener);
    addr
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut block = String::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).ok()?;
        if n == 0 || line == "\r\n" {
            break;
        }
        block.push_str(&line);
    }
    let headers = parse_header_block(&block);

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
