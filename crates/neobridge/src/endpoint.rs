//! # Endpoint
//!
//! One side of a bridge connection. An endpoint owns:
//!
//! - the **inbound table** of bound services, keyed by service name;
//! - the **pending-call table** of suspend callbacks awaiting a result;
//! - the **suspended table** of callee-side tasks still computing a result;
//! - weak references to the **proxies** taken from it.
//!
//! Two endpoints are connected by an external pairing step that hands each
//! the other's `InboundChannel`. Neither owns the other.
//!
//! ## Invariants
//!
//! - No table guard is held while calling a service or the channel, so a
//!   service may call back across the bridge while it is being dispatched.
//! - Failures raised by a service (errors and panics) become `failure`
//!   responses; they never unwind into the channel.
//! - A suspend callback is removed from the pending-call table before its
//!   result is handed over, so it resolves at most once.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use neosig::MemberKind;
use neosig::ServiceType;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::channel;
use crate::channel::CallChannel;
use crate::channel::InboundChannel;
use crate::codec;
use crate::envelope::CallEnvelope;
use crate::envelope::RESUME_SIGNATURE;
use crate::envelope::Response;
use crate::envelope::SERVICE_TYPE_SIGNATURE;
use crate::error::Error;
use crate::error::Result;
use crate::events::EventListener;
use crate::events::NoopListener;
use crate::outbound::ProxyState;
use crate::registry::ServiceTypeRegistry;
use crate::service::Service;

/// A bound service and its resolved type.
#[derive(Clone)]
pub(crate) struct InboundService {
    service: Arc<dyn Service>,
    service_type: Arc<ServiceType>,
}

/// A callee-side suspending call that has been acknowledged but not yet delivered.
pub(crate) struct SuspendedCall {
    service: String,
    abort: AbortHandle,
}

pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) listener: Arc<dyn EventListener>,
    pub(crate) registry: Arc<ServiceTypeRegistry>,
    pub(crate) outbound: OnceLock<Arc<dyn CallChannel>>,
    pub(crate) services: DashMap<String, InboundService>,
    pub(crate) callbacks: DashMap<String, oneshot::Sender<Response>>,
    pub(crate) suspended: DashMap<String, SuspendedCall>,
    pub(crate) proxies: DashMap<String, Vec<Weak<ProxyState>>>,
    next_callback: AtomicU64,
}

/// Configures an `Endpoint`.
pub struct EndpointBuilder {
    name: String,
    listener: Arc<dyn EventListener>,
    registry: Option<Arc<ServiceTypeRegistry>>,
}

impl EndpointBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), listener: Arc::new(NoopListener), registry: None }
    }

    pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Shares a type cache between endpoints. Each endpoint gets its own by default.
    pub fn registry(mut self, registry: Arc<ServiceTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Endpoint {
        Endpoint {
            inner: Arc::new(Inner {
                name: self.name,
                listener: self.listener,
                registry: self.registry.unwrap_or_default(),
                outbound: OnceLock::new(),
                services: DashMap::new(),
                callbacks: DashMap::new(),
                suspended: DashMap::new(),
                proxies: DashMap::new(),
                next_callback: AtomicU64::new(1),
            }),
        }
    }
}

/// One side of a bridge connection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Endpoint {
    pub(crate) inner: Arc<Inner>,
}

/// Connects two endpoints crosswise: each one's outbound channel is the other's inbound channel.
pub fn pair(a: &Endpoint, b: &Endpoint) -> Result<()> {
    a.connect(b.inbound_channel())?;
    b.connect(a.inbound_channel())
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        EndpointBuilder::new(name).build()
    }

    pub fn builder(name: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(name)
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn registry(&self) -> &Arc<ServiceTypeRegistry> {
        &self.inner.registry
    }

    /// The entry point a peer uses to reach this endpoint.
    pub fn inbound_channel(&self) -> Arc<dyn CallChannel> {
        Arc::new(InboundChannel::new(Arc::downgrade(&self.inner)))
    }

    /// Sets the channel used for every outbound call. Can only be done once.
    pub fn connect(&self, outbound: Arc<dyn CallChannel>) -> Result<()> {
        self.inner.outbound.set(outbound).map_err(|_| Error::AlreadyConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.outbound.get().is_some()
    }

    /// Registers `service` under `name`.
    ///
    /// Returns `NameAlreadyBound` if the name is currently registered.
    pub fn bind(&self, name: impl Into<String>, service: Arc<dyn Service>) -> Result<()> {
        let name = name.into();
        if self.inner.callbacks.contains_key(&name) {
            return Err(Error::NameAlreadyBound(name));
        }

        let service_type = self.inner.registry.type_of(service.as_ref())?;

        match self.inner.services.entry(name.clone()) {
            Entry::Occupied(_) => return Err(Error::NameAlreadyBound(name)),
            Entry::Vacant(slot) => {
                slot.insert(InboundService { service, service_type: service_type.clone() });
            }
        }

        tracing::debug!(endpoint = %self.inner.name, service = %name, ty = service_type.name(), "bound service");
        self.inner.listener.bind_service(&name, &service_type);
        Ok(())
    }

    /// Removes the registration for `name` and tells the peer it is gone.
    ///
    /// Names are scoped to the connection, not to one side: the peer drops
    /// everything it holds under `name`, including its own service bound under
    /// the same name, and closes its proxies to it.
    ///
    /// Returns `false` if nothing was bound under `name`; closing twice is safe.
    pub fn close_service(&self, name: &str) -> bool {
        if !self.remove_service(name) {
            return false;
        }
        self.disconnect_peer(name);
        true
    }

    /// Names of the services currently bound here.
    pub fn service_names(&self) -> BTreeSet<String> {
        self.inner.services.iter().map(|e| e.key().clone()).collect()
    }

    /// Names of the open proxies taken from this endpoint.
    pub fn client_names(&self) -> BTreeSet<String> {
        self.prune_proxies();
        self.inner
            .proxies
            .iter()
            .filter(|e| e.value().iter().any(|w| w.upgrade().is_some_and(|s| !s.is_closed())))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Handles one call envelope from the peer.
    pub(crate) fn receive(&self, text: &str) -> channel::Result<String> {
        let call = CallEnvelope::decode(text)?;
        tracing::trace!(
            endpoint = %self.inner.name,
            service = %call.target_service_name,
            signature = %call.signature,
            "inbound call"
        );
        self.dispatch(call).encode()
    }

    /// Handles a peer notification that `name` is gone.
    pub(crate) fn receive_disconnect(&self, name: &str) -> bool {
        let removed = self.remove_service(name);

        let cancelled = match self.inner.suspended.remove(name) {
            Some((_, call)) => {
                tracing::debug!(endpoint = %self.inner.name, callback = name, "peer cancelled suspended call");
                call.abort.abort();
                true
            }
            None => false,
        };

        let closed = self.close_proxies_named(name);
        removed || cancelled || closed
    }

    fn dispatch(&self, call: CallEnvelope) -> Response {
        let inbound = self
            .inner
            .services
            .get(&call.target_service_name)
            .map(|e| e.value().clone());

        if let Some(inbound) = inbound {
            return self.dispatch_service(inbound, call);
        }

        if self.inner.callbacks.contains_key(&call.target_service_name) {
            return self.dispatch_callback(call);
        }

        tracing::debug!(endpoint = %self.inner.name, service = %call.target_service_name, "unknown service");
        Response::UnknownService
    }

    fn dispatch_service(&self, inbound: InboundService, call: CallEnvelope) -> Response {
        let CallEnvelope { target_service_name: name, signature, suspend_callback_name, args } = call;

        if signature == SERVICE_TYPE_SIGNATURE {
            return match codec::encode(inbound.service_type.as_ref()) {
                Ok(text) => Response::Result(text),
                Err(e) => Response::Failure(e.to_string()),
            };
        }

        let Some(kind) = inbound.service_type.kind_of(&signature) else {
            let mismatch = Error::SignatureMismatch { service: name, signature };
            tracing::warn!(endpoint = %self.inner.name, "{}", mismatch);
            return Response::Failure(mismatch.to_string());
        };

        match (kind, suspend_callback_name) {
            (MemberKind::SuspendingMethod, Some(callback)) => {
                self.start_suspended(name, inbound.service, signature, args, callback)
            }
            (MemberKind::SuspendingMethod, None) => {
                Response::Failure(format!("'{}' is suspending and needs a callback", signature))
            }
            (_, Some(_)) => Response::Failure(format!("'{}' is not suspending", signature)),
            (_, None) => {
                let service = inbound.service;
                match catch_unwind(AssertUnwindSafe(|| service.call(&signature, &args))) {
                    Ok(Ok(result)) => Response::Result(result),
                    Ok(Err(failure)) => Response::Failure(failure.to_string()),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::warn!(endpoint = %self.inner.name, service = %name, %signature, "service panicked: {}", message);
                        Response::Failure(message)
                    }
                }
            }
        }
    }

    fn dispatch_callback(&self, call: CallEnvelope) -> Response {
        if call.signature != RESUME_SIGNATURE {
            let mismatch = Error::SignatureMismatch { service: call.target_service_name, signature: call.signature };
            return Response::Failure(mismatch.to_string());
        }

        let outcome = match Response::decode(&call.args) {
            Ok(Response::UnknownService) | Err(_) => {
                return Response::Failure(format!("malformed result for '{}'", call.target_service_name));
            }
            Ok(outcome) => outcome,
        };

        match self.inner.callbacks.remove(&call.target_service_name) {
            Some((_, sender)) => {
                // the caller may have stopped waiting
                let _ = sender.send(outcome);
                Response::ack()
            }
            None => Response::UnknownService,
        }
    }

    /// Acknowledges a suspending call and runs it on the async runtime.
    fn start_suspended(
        &self,
        name: String,
        service: Arc<dyn Service>,
        signature: String,
        args: String,
        callback: String,
    ) -> Response {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Response::Failure(format!("'{}' needs an async runtime to run", signature));
        };

        let endpoint = self.clone();
        let task_callback = callback.clone();
        let (registered, is_registered) = oneshot::channel::<()>();

        let task = runtime.spawn(async move {
            // the suspended table entry must exist before the task can remove it
            let _ = is_registered.await;

            let outcome = AssertUnwindSafe(service.call_suspending(&signature, args))
                .catch_unwind()
                .await;

            let response = match outcome {
                Ok(Ok(result)) => Response::Result(result),
                Ok(Err(failure)) => Response::Failure(failure.to_string()),
                Err(panic) => Response::Failure(panic_message(panic.as_ref())),
            };

            endpoint.inner.suspended.remove(&task_callback);
            endpoint.deliver(&task_callback, response);
        });

        self.inner
            .suspended
            .insert(callback, SuspendedCall { service: name, abort: task.abort_handle() });
        let _ = registered.send(());

        Response::ack()
    }

    /// Sends the eventual result of a suspending call to the caller's callback.
    fn deliver(&self, callback: &str, outcome: Response) {
        let args = match outcome.encode() {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(endpoint = %self.inner.name, callback, "cannot encode result: {}", e);
                return;
            }
        };

        let call = CallEnvelope::new(callback, RESUME_SIGNATURE, args);
        match self.call_outbound(&call) {
            Ok(Response::Result(_)) => {}
            Ok(Response::UnknownService) => {
                tracing::debug!(endpoint = %self.inner.name, callback, "result already delivered or call cancelled");
            }
            Ok(Response::Failure(failure)) => {
                tracing::warn!(endpoint = %self.inner.name, callback, "caller rejected result: {}", failure);
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.inner.name, callback, "cannot deliver result: {}", e);
            }
        }
    }

    /// Sends one envelope through the outbound channel.
    pub(crate) fn call_outbound(&self, call: &CallEnvelope) -> Result<Response> {
        let channel = self.inner.outbound.get().ok_or(Error::NotConnected)?;
        let text = call.encode()?;
        let reply = channel.call(&text)?;
        Ok(Response::decode(&reply)?)
    }

    /// Best-effort notification; never waits for more than the channel call itself.
    pub(crate) fn disconnect_peer(&self, name: &str) -> bool {
        match self.inner.outbound.get() {
            Some(channel) => channel.disconnect(name),
            None => false,
        }
    }

    pub(crate) fn next_callback_name(&self) -> String {
        let n = self.inner.next_callback.fetch_add(1, Ordering::Relaxed);
        format!("{}/callback/{}", self.inner.name, n)
    }

    /// Drops an inbound registration without notifying the peer.
    fn remove_service(&self, name: &str) -> bool {
        let Some((_, inbound)) = self.inner.services.remove(name) else {
            return false;
        };

        self.inner.suspended.retain(|_, call| {
            if call.service == name {
                call.abort.abort();
                false
            } else {
                true
            }
        });

        inbound.service.close();
        tracing::debug!(endpoint = %self.inner.name, service = name, "closed service");
        self.inner.listener.close_service(name);
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "service panicked".to_string()
    }
}
