//! # Services
//!
//! A `Service` is a real implementation that can be bound on an endpoint. The
//! endpoint routes calls to it by canonical signature; the service decodes
//! arguments and encodes results with whatever codec its peer agreed on.

use std::sync::Arc;

use neosig::Interface;

/// A failure raised by a service implementation.
///
/// Crosses the channel as its description only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure(String);

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Failure {}

impl From<crate::Error> for Failure {
    fn from(e: crate::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Encoded result of a member invocation.
pub type CallResult = std::result::Result<String, Failure>;

/// A bridgeable service implementation.
///
/// The endpoint only calls `call` / `call_suspending` with signatures present
/// in the service type of `interface()`, and only with the matching kind.
#[async_trait::async_trait]
pub trait Service: Send + Sync + 'static {
    /// The declared interface this service implements.
    fn interface(&self) -> Arc<Interface>;

    /// Invokes a function or property member.
    fn call(&self, signature: &str, _args: &str) -> CallResult {
        Err(Failure::new(format!("no member '{}'", signature)))
    }

    /// Invokes a suspending function. Runs on the async runtime after the call was acknowledged.
    async fn call_suspending(&self, signature: &str, _args: String) -> CallResult {
        Err(Failure::new(format!("no suspending member '{}'", signature)))
    }

    /// Called once when the service's registration is removed.
    fn close(&self) {}
}
