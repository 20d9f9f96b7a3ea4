//! Handler shapes and the adapter that gives both one call signature.
//!
//! Business logic comes in one of two shapes:
//! - [`RequestHandler`]: takes a [`StructuredRequest`], returns a
//!   [`StructuredResponse`]; the adapter bridges to and from the wire format
//! - [`EventHandler`]: takes the raw event and [`Context`], returns the
//!   result payload as-is
//!
//! The shape is chosen once at startup through [`HandlerRegistry::resolve`].

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::api::Context;
use crate::bridge::{self, StructuredRequest, StructuredResponse};
use crate::error::{BridgeError, HandlerError, StartupError};
use crate::runtime::telemetry::Timings;

/// Request-shaped business logic.
pub trait RequestHandler {
    fn handle(&self, request: StructuredRequest) -> Result<StructuredResponse, HandlerError>;
}

impl<F> RequestHandler for F
where
    F: Fn(StructuredRequest) -> Result<StructuredResponse, HandlerError>,
{
    fn handle(&self, request: StructuredRequest) -> Result<StructuredResponse, HandlerError> {
        self(request)
    }
}

/// Raw-shaped business logic.
pub trait EventHandler {
    fn call(&self, event: Value, context: &Context) -> Result<Value, HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(Value, &Context) -> Result<Value, HandlerError>,
{
    fn call(&self, event: Value, context: &Context) -> Result<Value, HandlerError> {
        self(event, context)
    }
}

/// The single call signature the invocation loop drives.
pub trait Dispatch {
    /// Produce the payload to post as the invocation's result.
    fn dispatch(
        &self,
        event: Value,
        context: &Context,
        timings: &mut Timings,
    ) -> Result<Value, HandlerError>;
}

/// Runs a [`RequestHandler`] between the two bridge conversions.
pub struct HttpAdapter {
    handler: Box<dyn RequestHandler>,
}

impl HttpAdapter {
    pub fn new(handler: Box<dyn RequestHandler>) -> Self {
        Self { handler }
    }
}

impl Dispatch for HttpAdapter {
    fn dispatch(
        &self,
        event: Value,
        _context: &Context,
        timings: &mut Timings,
    ) -> Result<Value, HandlerError> {
        let request = Timings::measure(&mut timings.to_request_ms, || bridge::to_request(event))?;
        debug!(
            target: "lambda_runtime_bridge::bridge",
            "Event converted to request: {} {}",
            request.method,
            request.path
        );

        let response = Timings::measure(&mut timings.handler_ms, || self.handler.handle(request))?;
        debug!(
            target: "lambda_runtime_bridge::bridge",
            "Handler returned status {}",
            response.status
        );

        Timings::measure(&mut timings.from_response_ms, || {
            let wire = bridge::from_response(response);
            serde_json::to_value(wire).map_err(BridgeError::from)
        })
        .map_err(HandlerError::from)
    }
}

/// Passes the raw event and context straight to an [`EventHandler`].
pub struct FunctionAdapter {
    handler: Box<dyn EventHandler>,
}

impl FunctionAdapter {
    pub fn new(handler: Box<dyn EventHandler>) -> Self {
        Self { handler }
    }
}

impl Dispatch for FunctionAdapter {
    fn dispatch(
        &self,
        event: Value,
        context: &Context,
        timings: &mut Timings,
    ) -> Result<Value, HandlerError> {
        Timings::measure(&mut timings.handler_ms, || self.handler.call(event, context))
    }
}

/// Externally supplied business logic in one of the recognized shapes.
pub enum HandlerCapability {
    Request(Box<dyn RequestHandler>),
    Event(Box<dyn EventHandler>),
}

impl HandlerCapability {
    pub fn request(handler: impl RequestHandler + 'static) -> Self {
        HandlerCapability::Request(Box::new(handler))
    }

    pub fn event(handler: impl EventHandler + 'static) -> Self {
        HandlerCapability::Event(Box::new(handler))
    }

    pub fn shape(&self) -> &'static str {
        match self {
            HandlerCapability::Request(_) => "request",
            HandlerCapability::Event(_) => "event",
        }
    }

    /// Wrap the handler behind the loop's call signature.
    pub fn into_dispatcher(self) -> Box<dyn Dispatch> {
        match self {
            HandlerCapability::Request(handler) => Box::new(HttpAdapter::new(handler)),
            HandlerCapability::Event(handler) => Box::new(FunctionAdapter::new(handler)),
        }
    }
}

/// Named handlers the bootstrap can be pointed at.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerCapability>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` under `name`, replacing any previous entry.
    pub fn register(mut self, name: impl Into<String>, capability: HandlerCapability) -> Self {
        self.handlers.insert(name.into(), capability);
        self
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Select the handler for this process.
    ///
    /// An unknown name is a startup failure: nothing matches either shape.
    pub fn resolve(mut self, name: &str) -> Result<Box<dyn Dispatch>, StartupError> {
        let capability = self
            .handlers
            .remove(name)
            .ok_or_else(|| StartupError::unknown_handler(name))?;
        debug!(
            target: "lambda_runtime_bridge::runtime",
            "Resolved handler '{}' as {}-shaped",
            name,
            capability.shape()
        );
        Ok(capability.into_dispatcher())
    }
}
