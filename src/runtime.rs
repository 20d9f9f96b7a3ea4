//! The invocation loop.
//!
//! Each cycle fetches one invocation, dispatches it, and reports the outcome:
//!
//! ```text
//! WAITING --fetch--> DISPATCHING --ok--> SENDING --ok--> WAITING
//!    |                    |                 |
//!    | fetch failed       | handler failed  | send failed
//!    v                    v                 v
//!  FATAL               ERRORING <-----------+  --> WAITING
//! ```
//!
//! Only a failed fetch ends the loop. Everything that goes wrong after an
//! invocation is in hand, panics included, is reported to the host as an
//! error for that invocation.

pub mod telemetry;
pub mod trace;

use std::convert::Infallible;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use log::{debug, error};

use crate::api::{ErrorReport, Invocation, RuntimeApi};
use crate::error::{FatalError, HandlerError, InvocationError};
use crate::handler::Dispatch;
use telemetry::Timings;
use trace::{NoopTraceSink, TraceSink};

const LOG_TARGET: &str = "lambda_runtime_bridge::runtime";

/// How a single invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The result was accepted by the host.
    Responded,
    /// The invocation failed and an error report was sent.
    Reported,
}

/// Drives a [`Dispatch`] against a [`RuntimeApi`], one invocation at a time.
pub struct Runtime<A> {
    api: A,
    dispatcher: Box<dyn Dispatch>,
    trace_sink: Box<dyn TraceSink>,
    debug: bool,
}

impl<A: RuntimeApi> Runtime<A> {
    pub fn new(api: A, dispatcher: Box<dyn Dispatch>) -> Self {
        Self {
            api,
            dispatcher,
            trace_sink: Box::new(NoopTraceSink),
            debug: false,
        }
    }

    /// Where trace ids are published before each dispatch.
    pub fn with_trace_sink(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace_sink = Box::new(sink);
        self
    }

    /// Enable per-invocation timing records and lifecycle debug lines.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Process invocations until fetching the next one fails.
    pub fn run(&self) -> Result<Infallible, FatalError> {
        if self.debug {
            debug!(target: LOG_TARGET, "Runtime loop starting");
        }
        loop {
            if let Err(fatal) = self.run_once() {
                error!(target: LOG_TARGET, "Fatal runtime error: {}", fatal);
                return Err(fatal);
            }
        }
    }

    /// One full cycle: fetch, dispatch, report.
    pub fn run_once(&self) -> Result<Outcome, FatalError> {
        let mut timings = Timings::default();

        if self.debug {
            debug!(target: LOG_TARGET, "Waiting for invocation");
        }
        let invocation = Timings::measure(&mut timings.fetch_ms, || self.api.next_invocation())
            .map_err(FatalError::Fetch)?;

        let request_id = invocation.request_id().to_string();
        if self.debug {
            debug!(
                target: LOG_TARGET,
                "Invocation received: request_id={} event_keys={:?}",
                request_id,
                invocation.event_keys()
            );
        }

        self.trace_sink
            .publish(invocation.context.trace_id.as_deref());

        let started = Instant::now();
        let outcome = match self.process(invocation, &mut timings) {
            Ok(()) => Outcome::Responded,
            Err(failure) => {
                self.report(&request_id, &failure);
                Outcome::Reported
            }
        };
        timings.total_ms = Some(telemetry::millis(started.elapsed()));

        if self.debug {
            telemetry::emit(&request_id, &timings, telemetry::memory_usage());
        }
        Ok(outcome)
    }

    fn process(&self, invocation: Invocation, timings: &mut Timings) -> Result<(), InvocationError> {
        let request_id = invocation.request_id().to_string();
        let Invocation { event, context, .. } = invocation;

        let dispatched = catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher.dispatch(event, &context, timings)
        }));
        let payload = match dispatched {
            Ok(result) => result?,
            Err(panic) => return Err(HandlerError::from_panic(panic).into()),
        };

        Timings::measure(&mut timings.send_ms, || {
            self.api.send_response(&request_id, &payload)
        })
        .map_err(InvocationError::Send)
    }

    fn report(&self, request_id: &str, failure: &InvocationError) {
        let report = ErrorReport::from(failure);
        let location = match failure {
            InvocationError::Handler(e) => e
                .location()
                .map_or_else(|| "unknown".to_string(), ToString::to_string),
            InvocationError::Send(_) => "runtime API".to_string(),
        };

        error!(
            target: LOG_TARGET,
            "Request {} failed: {}: {} in {}",
            request_id,
            report.error_type,
            report.error_message,
            location
        );

        self.api.send_error(request_id, &report);
    }
}
