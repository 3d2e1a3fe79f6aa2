//! # Call Channel
//!
//! The narrow, synchronous interface that connects two endpoints.
//!
//! ## Philosophy
//!
//! - **Text-Oriented**: The channel moves opaque envelopes. It knows nothing
//!   about services, signatures or payload codecs.
//! - **Request-Response**: `call` hands over one envelope and returns one
//!   envelope. Suspending calls are built on top of this with a second call in
//!   the opposite direction, never by blocking here.
//! - **Crosswise**: In-process, one side's outbound channel is literally the
//!   other side's `InboundChannel`. Out of process, any transport that can
//!   carry two strings satisfies the same trait.

use std::sync::Weak;

use crate::endpoint::Endpoint;
use crate::endpoint::Inner;

/// Channel-level faults. Ordinary call failures travel inside response envelopes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is gone (dropped endpoint, closed pipe).
    ConnectionLost(String),
    /// An envelope could not be decoded.
    Protocol(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Protocol(msg) => write!(f, "Malformed envelope: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Moves call envelopes to the peer endpoint.
///
/// This trait is object-safe (`Arc<dyn CallChannel>`).
pub trait CallChannel: Send + Sync + 'static {
    /// Delivers a call envelope and returns the response envelope.
    ///
    /// # Invariants
    /// - Must not interpret payloads.
    /// - Must return `Err` only for channel faults; a failed call is an `Ok` response.
    fn call(&self, call: &str) -> Result<String>;

    /// Tells the peer that `name` is gone on this side.
    ///
    /// Returns whether the peer had anything registered under that name.
    fn disconnect(&self, name: &str) -> bool;
}

/// An endpoint's inbound entry point.
///
/// Holds the endpoint weakly: pairing two endpoints never creates an ownership
/// cycle, and a channel outliving its endpoint reports `ConnectionLost`.
#[derive(Clone)]
pub struct InboundChannel {
    endpoint: Weak<Inner>,
}

impl InboundChannel {
    pub(crate) fn new(endpoint: Weak<Inner>) -> Self {
        Self { endpoint }
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.upgrade().map(Endpoint::from_inner)
    }
}

impl CallChannel for InboundChannel {
    fn call(&self, call: &str) -> Result<String> {
        let endpoint = self
            .endpoint()
            .ok_or_else(|| TransportError::ConnectionLost("endpoint dropped".into()))?;
        endpoint.receive(call)
    }

    fn disconnect(&self, name: &str) -> bool {
        match self.endpoint() {
            Some(endpoint) => endpoint.receive_disconnect(name),
            None => false,
        }
    }
}
