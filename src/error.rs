//! Error taxonomy for the runtime.
//!
//! The kind of an error decides what the invocation loop does with it:
//! [`InvocationError`] ends one invocation and is reported to the host,
//! [`FatalError`] ends the loop, and [`StartupError`] keeps the loop from
//! ever starting.

use std::any::Any;
use std::panic::Location;

use thiserror::Error;

use crate::api::StackFrame;

/// Failure talking to the host's invocation endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure or an unexpected HTTP status from the host.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// The host answered successfully but the answer is unusable.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ApiError {
    /// Create a transport error without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Create a transport error for a non-success HTTP status.
    pub fn unexpected_status(message: impl Into<String>, status: u16, body: String) -> Self {
        ApiError::Transport {
            message: format!("{} (HTTP {})", message.into(), status),
            status: Some(status),
            body: Some(body),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        ApiError::Protocol {
            message: message.into(),
        }
    }

    /// Name reported to the host as `errorType`.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } => "TransportError",
            ApiError::Protocol { .. } => "ProtocolError",
        }
    }

    /// HTTP status attached to a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => *status,
            ApiError::Protocol { .. } => None,
        }
    }
}

/// Failure converting between wire events/results and structured messages.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("body is flagged as base64 but does not decode: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("failed to serialize wire result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Any failure raised while running the handler or its bridging.
///
/// Carries everything needed to build the error envelope sent to the host,
/// so the original error value does not have to outlive the invocation.
#[derive(Debug, Error)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    error_type: String,
    message: String,
    stack_trace: Vec<StackFrame>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HandlerError {
    /// Wrap a concrete error, recording its type name and where it was raised.
    #[track_caller]
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            error_type: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            stack_trace: StackFrame::capture(Location::caller()),
            source: Some(Box::new(error)),
        }
    }

    /// Build an error from a type label and message.
    #[track_caller]
    pub fn msg(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            stack_trace: StackFrame::capture(Location::caller()),
            source: None,
        }
    }

    /// Convert a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked with a non-string payload".to_string()
        };
        Self {
            error_type: "Panic".to_string(),
            message,
            stack_trace: Vec::new(),
            source: None,
        }
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> &[StackFrame] {
        &self.stack_trace
    }

    /// The first recorded frame, used as the source location in logs.
    pub fn location(&self) -> Option<&StackFrame> {
        self.stack_trace.first()
    }
}

impl From<BridgeError> for HandlerError {
    #[track_caller]
    fn from(error: BridgeError) -> Self {
        HandlerError::new(error)
    }
}

/// Recoverable failure scoped to a single invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The host refused or never received the result.
    #[error("failed to send response: {0}")]
    Send(#[source] ApiError),
}

/// Failure that leaves the loop without an invocation to work on.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to fetch next invocation: {0}")]
    Fetch(#[source] ApiError),
}

/// Failure before the loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No registered handler carries the configured name.
    #[error("handler '{name}' is neither a request handler nor an event handler")]
    UnknownHandler { name: String },

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("failed to initialize runtime API client: {0}")]
    Client(#[source] ApiError),
}

impl StartupError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        StartupError::Config {
            message: message.into(),
        }
    }

    /// Create an unknown handler error
    pub fn unknown_handler(name: impl Into<String>) -> Self {
        StartupError::UnknownHandler { name: name.into() }
    }
}
