//! # Request-Typed Capabilities
//!
//! External collaborators (a language model, a scripted stand-in) are
//! described by the requests they can answer rather than by a named trait
//! per service.
//!
//! - [`Request`]: an operation and its response type
//! - [`Capability`]: marker for things that handle requests
//! - [`Handles<R>`]: "this capability answers requests of type R"
//!
//! ```
//! use causalq_core::capability::{Capability, CapabilityError, Handles, Request};
//!
//! struct Ping;
//! impl Request for Ping {
//!     type Response = String;
//!     fn name() -> &'static str { "Ping" }
//! }
//!
//! struct PingService;
//! impl Capability for PingService {
//!     fn capability_name(&self) -> &'static str { "PingService" }
//! }
//! impl Handles<Ping> for PingService {
//!     fn handle(&self, _req: Ping) -> Result<String, CapabilityError> {
//!         Ok("pong".to_string())
//!     }
//! }
//!
//! assert_eq!(PingService.handle(Ping).unwrap(), "pong");
//! ```

use thiserror::Error;

/// Error when a capability can't answer a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The collaborator could not be reached or refused the call
    #[error("Transport failure in {capability}: {message}")]
    Transport {
        capability: &'static str,
        message: String,
    },

    /// Handler ran but failed to produce a response
    #[error("Handler failed: {message}")]
    HandlerFailed { message: String },

    /// A scripted collaborator has no responses left
    #[error("{capability} has no responses left")]
    Exhausted { capability: &'static str },
}

impl CapabilityError {
    /// Transport-level failures are the ones worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(self, CapabilityError::Transport { .. })
    }
}

/// A request defines an operation and its response type.
pub trait Request: Send + 'static {
    /// The type returned when this request is handled
    type Response: Send + 'static;

    /// Human-readable name for logs and errors
    fn name() -> &'static str;
}

/// Marker trait for capabilities (objects that handle requests).
pub trait Capability: Send + Sync + 'static {
    /// Human-readable name for this capability
    fn capability_name(&self) -> &'static str;
}

/// A capability that can handle requests of type R.
pub trait Handles<R: Request>: Capability {
    /// Handle a request and return the response
    fn handle(&self, req: R) -> Result<R::Response, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(String);

    impl Request for Echo {
        type Response = String;
        fn name() -> &'static str {
            "Echo"
        }
    }

    struct Flaky;

    impl Capability for Flaky {
        fn capability_name(&self) -> &'static str {
            "Flaky"
        }
    }

    impl Handles<Echo> for Flaky {
        fn handle(&self, req: Echo) -> Result<String, CapabilityError> {
            if req.0.is_empty() {
                Err(CapabilityError::Transport {
                    capability: self.capability_name(),
                    message: "connection reset".into(),
                })
            } else {
                Ok(req.0)
            }
        }
    }

    #[test]
    fn test_handle_and_transport_classification() {
        assert_eq!(Flaky.handle(Echo("hi".into())).unwrap(), "hi");
        let err = Flaky.handle(Echo(String::new())).unwrap_err();
        assert!(err.is_transport());
        assert!(!CapabilityError::Exhausted { capability: "x" }.is_transport());
        assert_eq!(Echo::name(), "Echo");
    }
}
