//! Propagation of the host's trace identifier to downstream instrumentation.

/// Environment variable tracing libraries read the current trace header from.
pub const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// Receives the trace id of each invocation before it is dispatched.
pub trait TraceSink {
    /// `None` means the current invocation carries no trace id.
    fn publish(&self, trace_id: Option<&str>);
}

/// Exposes the trace id through [`TRACE_ID_ENV`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvTraceSink;

impl TraceSink for EnvTraceSink {
    fn publish(&self, trace_id: Option<&str>) {
        // SAFETY: called only from the invocation loop after a fetch has
        // completed and before dispatch. No handler code is running and the
        // HTTP client has no request in flight.
        unsafe {
            match trace_id {
                Some(id) => std::env::set_var(TRACE_ID_ENV, id),
                None => std::env::remove_var(TRACE_ID_ENV),
            }
        }
    }
}

/// Discards trace ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn publish(&self, _trace_id: Option<&str>) {}
}
