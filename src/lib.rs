pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod runtime;

pub use api::{ApiClient, Context, ErrorReport, Invocation, RuntimeApi};
pub use bridge::{StructuredRequest, StructuredResponse};
pub use config::{RuntimeConfig, RuntimeSettings};
pub use error::{ApiError, BridgeError, FatalError, HandlerError, InvocationError, StartupError};
pub use handler::{HandlerCapability, HandlerRegistry};
pub use runtime::{Outcome, Runtime};
