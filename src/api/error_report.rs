//! Error envelope posted to `/invocation/{id}/error`.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, HandlerError, InvocationError};

/// Symbol prefixes that belong to the toolchain or to error construction
/// itself rather than to the code that failed.
const INTERNAL_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "__rust",
    "lambda_runtime_bridge::error::",
    "lambda_runtime_bridge::api::error_report::",
];

/// Generic error envelope understood by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_type: String,
    pub error_message: String,
    pub stack_trace: Vec<String>,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: Vec::new(),
        }
    }
}

impl From<&HandlerError> for ErrorReport {
    fn from(error: &HandlerError) -> Self {
        Self {
            error_type: error.error_type().to_string(),
            error_message: error.message().to_string(),
            stack_trace: error.stack_trace().iter().map(ToString::to_string).collect(),
        }
    }
}

impl From<&ApiError> for ErrorReport {
    fn from(error: &ApiError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

impl From<&InvocationError> for ErrorReport {
    fn from(error: &InvocationError) -> Self {
        match error {
            InvocationError::Handler(e) => e.into(),
            InvocationError::Send(e) => e.into(),
        }
    }
}

/// One rendered stack frame: `file(line): [class][separator]function()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    file: Option<String>,
    line: Option<u32>,
    class: Option<String>,
    function: Option<String>,
}

impl StackFrame {
    /// Frame for a source location with no symbol information.
    pub fn at(location: &Location<'_>) -> Self {
        Self {
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            class: None,
            function: None,
        }
    }

    /// Frame for a demangled symbol such as `app::orders::Service::place`.
    pub fn from_symbol(symbol: &str) -> Self {
        let (class, function) = split_symbol(symbol);
        Self {
            file: None,
            line: None,
            class,
            function: Some(function),
        }
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Collect frames for an error raised at `location`.
    ///
    /// The caller location always comes first. When backtraces are enabled
    /// through `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`, the application frames
    /// of a captured backtrace follow it.
    pub(crate) fn capture(location: &Location<'_>) -> Vec<StackFrame> {
        let mut frames = vec![StackFrame::at(location)];
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            frames.extend(
                parse_backtrace(&backtrace.to_string())
                    .into_iter()
                    .filter(|frame| !frame.is_internal()),
            );
        }
        frames
    }

    fn is_internal(&self) -> bool {
        let symbol = match (&self.class, &self.function) {
            (Some(class), _) => class.as_str(),
            (None, Some(function)) => function.as_str(),
            (None, None) => return true,
        };
        let symbol = symbol.trim_start_matches('<');
        INTERNAL_PREFIXES.iter().any(|p| symbol.starts_with(p))
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.class.is_some() { "::" } else { "" };
        write!(
            f,
            "{}({}): {}{}{}()",
            self.file.as_deref().unwrap_or("unknown"),
            self.line.unwrap_or(0),
            self.class.as_deref().unwrap_or(""),
            separator,
            self.function.as_deref().unwrap_or("unknown"),
        )
    }
}

/// Parse the `Display` form of a [`Backtrace`].
///
/// ```text
///    0: app::orders::place
///              at ./src/orders.rs:42:9
///    1: app::main
/// ```
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        let line = line.trim();

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line) = split_location(location);
                frame.file = Some(file.to_string());
                frame.line = line;
            }
            continue;
        }

        if let Some((index, symbol)) = line.split_once(": ")
            && !index.is_empty()
            && index.bytes().all(|b| b.is_ascii_digit())
        {
            frames.push(StackFrame::from_symbol(symbol.trim()));
        }
    }

    frames
}

/// Split `path:line:column` into path and line, tolerating a missing column.
fn split_location(location: &str) -> (&str, Option<u32>) {
    let Some((head, last)) = location.rsplit_once(':') else {
        return (location, None);
    };
    let Ok(last) = last.parse::<u32>() else {
        return (location, None);
    };
    match head.rsplit_once(':') {
        Some((path, line)) => match line.parse::<u32>() {
            Ok(line) => (path, Some(line)),
            Err(_) => (head, Some(last)),
        },
        None => (head, Some(last)),
    }
}

/// Split a symbol into its owner path and function name at the last `::`
/// outside of generic brackets. Hash suffixes (`::h0123456789abcdef`) are dropped.
fn split_symbol(symbol: &str) -> (Option<String>, String) {
    let symbol = strip_hash(symbol);
    let bytes = symbol.as_bytes();
    let mut depth = 0usize;
    let mut split_at = None;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match split_at {
        Some(at) => (Some(symbol[..at].to_string()), symbol[at + 2..].to_string()),
        None => (None, symbol.to_string()),
    }
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}
