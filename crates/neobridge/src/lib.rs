//! # NeoBridge
//!
//! Lets two runtimes call each other's services through a narrow, text-only
//! call channel.
//!
//! - Each side runs an `Endpoint`. A service bound on one endpoint is reached
//!   from the other through an `OutboundService` proxy taken by name.
//! - Calls are routed by canonical signature (see `neosig`), so both sides
//!   agree on dispatch keys without sharing code.
//! - Suspending calls are acknowledged immediately; the result comes back
//!   later as a second call to a per-call callback on the caller's endpoint.
//!
//! Endpoints are connected by handing each the other's inbound channel:
//!
//! ```no_run
//! use neobridge::Endpoint;
//!
//! let host = Endpoint::new("host");
//! let guest = Endpoint::new("guest");
//! neobridge::pair(&host, &guest).unwrap();
//! ```

mod channel;
mod codec;
mod endpoint;
mod envelope;
mod error;
mod events;
mod outbound;
mod registry;
mod service;

pub mod testing;

#[cfg(test)]
mod tests;

pub use crate::error::Error;
pub use crate::error::Result;

pub use crate::channel::CallChannel;
pub use crate::channel::InboundChannel;
pub use crate::channel::TransportError;

pub use crate::envelope::CallEnvelope;
pub use crate::envelope::RESUME_SIGNATURE;
pub use crate::envelope::Response;
pub use crate::envelope::SERVICE_TYPE_SIGNATURE;

pub use crate::endpoint::Endpoint;
pub use crate::endpoint::EndpointBuilder;
pub use crate::endpoint::pair;
pub use crate::outbound::OutboundService;

pub use crate::events::EventListener;
pub use crate::events::NoopListener;
pub use crate::registry::ServiceTypeRegistry;
pub use crate::service::CallResult;
pub use crate::service::Failure;
pub use crate::service::Service;

pub use crate::codec::decode;
pub use crate::codec::encode;

pub use neosig;
