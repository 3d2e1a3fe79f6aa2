//! Endpoint lifecycle hooks.

use neosig::ServiceType;

use crate::error::Result;

/// Observes bridge activity on one endpoint. Every hook defaults to a no-op.
pub trait EventListener: Send + Sync + 'static {
    /// A service was bound under `name`.
    fn bind_service(&self, _name: &str, _service_type: &ServiceType) {}

    /// A proxy to `name` was taken.
    fn take_service(&self, _name: &str) {}

    /// An outbound call is about to be sent.
    fn call_start(&self, _name: &str, _signature: &str) {}

    /// An outbound call completed, successfully or not.
    fn call_end(&self, _name: &str, _signature: &str, _result: &Result<String>) {}

    /// An inbound registration or a proxy named `name` was closed.
    fn close_service(&self, _name: &str) {}
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl EventListener for NoopListener {}
