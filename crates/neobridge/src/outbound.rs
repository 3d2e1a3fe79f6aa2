//! # Outbound Services
//!
//! Proxies that send calls across the channel to a service bound on the peer.
//!
//! ## Philosophy
//!
//! - **Resolve at Take Time**: The proxy's source type is computed from the
//!   declared interface when the proxy is taken, not on first call.
//! - **Closed Is Final**: Once a proxy is closed, locally or because the peer
//!   reported its name unknown, every call fails with `ServiceClosed` and
//!   every outstanding suspending call is failed instead of left hanging.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashSet;
use neosig::Interface;
use neosig::ServiceType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::codec;
use crate::endpoint::Endpoint;
use crate::envelope::CallEnvelope;
use crate::envelope::Response;
use crate::envelope::SERVICE_TYPE_SIGNATURE;
use crate::error::Error;
use crate::error::Result;

pub(crate) struct ProxyState {
    name: String,
    source_type: Arc<ServiceType>,
    target_type: Mutex<Option<Arc<ServiceType>>>,
    closed: AtomicBool,
    outstanding: DashSet<String>,
}

impl ProxyState {
    fn new(name: String, source_type: Arc<ServiceType>) -> Self {
        Self {
            name,
            source_type,
            target_type: Mutex::new(None),
            closed: AtomicBool::new(false),
            outstanding: DashSet::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> Error {
        Error::ServiceClosed(self.name.clone())
    }
}

/// A proxy for a service bound on the peer endpoint.
///
/// Clones share state: closing one clone closes them all.
#[derive(Clone)]
pub struct OutboundService {
    endpoint: Endpoint,
    state: Arc<ProxyState>,
}

impl OutboundService {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// The type computed from the declared interface. `None` once closed.
    pub fn source_type(&self) -> Option<Arc<ServiceType>> {
        if self.is_closed() {
            return None;
        }
        Some(self.state.source_type.clone())
    }

    /// The type the peer reports for its implementation.
    ///
    /// `None` if the proxy is closed or the peer cannot answer.
    pub fn target_type(&self) -> Option<Arc<ServiceType>> {
        if self.is_closed() {
            return None;
        }

        let mut cached = self.state.target_type.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(target) = cached.as_ref() {
            return Some(target.clone());
        }

        let call = CallEnvelope::new(self.state.name.clone(), SERVICE_TYPE_SIGNATURE, "");
        match self.endpoint.call_outbound(&call) {
            Ok(Response::Result(text)) => {
                let target: ServiceType = codec::decode(&text).ok()?;
                let target = Arc::new(target);
                *cached = Some(target.clone());
                Some(target)
            }
            Ok(Response::UnknownService) => {
                drop(cached);
                self.endpoint.close_proxy_state(&self.state, false);
                None
            }
            Ok(Response::Failure(failure)) => {
                tracing::debug!(service = %self.state.name, "target type unavailable: {}", failure);
                None
            }
            Err(e) => {
                tracing::debug!(service = %self.state.name, "target type unavailable: {}", e);
                None
            }
        }
    }

    /// Invokes a non-suspending member with already-encoded arguments.
    pub fn invoke(&self, signature: &str, args: impl Into<String>) -> Result<String> {
        self.endpoint.invoke(self, signature, args.into())
    }

    /// Invokes a suspending member with already-encoded arguments.
    pub async fn invoke_suspending(&self, signature: &str, args: impl Into<String>) -> Result<String> {
        self.endpoint.invoke_suspending(self, signature, args.into()).await
    }

    /// Encodes `args`, invokes `signature` and decodes the result.
    pub fn call<A, R>(&self, signature: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let result = self.invoke(signature, codec::encode(args)?)?;
        codec::decode(&result)
    }

    /// Suspending counterpart of `call`.
    pub async fn call_suspending<A, R>(&self, signature: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = codec::encode(args)?;
        let result = self.invoke_suspending(signature, args).await?;
        codec::decode(&result)
    }

    /// Closes the proxy and tells the peer to drop its registration.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.endpoint.close_proxy_state(&self.state, true)
    }
}

impl std::fmt::Debug for OutboundService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundService")
            .field("endpoint", &self.endpoint.name())
            .field("name", &self.state.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Bookkeeping for one suspending call in flight.
///
/// Dropping it before the result arrives cancels the call on the peer.
struct PendingCall {
    endpoint: Endpoint,
    state: Arc<ProxyState>,
    callback: String,
    resolved: bool,
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.state.outstanding.remove(&self.callback);
        if self.resolved {
            return;
        }

        if self.endpoint.inner.callbacks.remove(&self.callback).is_some() {
            tracing::debug!(endpoint = %self.endpoint.name(), callback = %self.callback, "cancelling suspending call");
            self.endpoint.disconnect_peer(&self.callback);
        }
    }
}

impl Endpoint {
    /// Creates a proxy for the peer service `name`, typed by `interface`.
    pub fn take(&self, name: impl Into<String>, interface: &Interface) -> Result<OutboundService> {
        let name = name.into();
        let source_type = self.inner.registry.type_of_interface(interface)?;
        let state = Arc::new(ProxyState::new(name.clone(), source_type));

        self.prune_proxies();
        self.inner.proxies.entry(name.clone()).or_default().push(Arc::downgrade(&state));

        tracing::debug!(endpoint = %self.inner.name, service = %name, "took service");
        self.inner.listener.take_service(&name);
        Ok(OutboundService { endpoint: self.clone(), state })
    }

    /// Sends a non-suspending call through `proxy` and waits for its response.
    pub fn invoke(&self, proxy: &OutboundService, signature: &str, args: String) -> Result<String> {
        let state = &proxy.state;
        if state.is_closed() {
            return Err(state.closed_error());
        }

        self.inner.listener.call_start(&state.name, signature);

        let call = CallEnvelope::new(state.name.clone(), signature, args);
        let result = match self.call_outbound(&call) {
            Ok(Response::Result(result)) => Ok(result),
            Ok(Response::Failure(failure)) => Err(remote_failure(&state.name, signature, failure)),
            Ok(Response::UnknownService) => {
                self.close_proxy_state(state, false);
                Err(state.closed_error())
            }
            Err(e) => Err(e),
        };

        self.inner.listener.call_end(&state.name, signature, &result);
        result
    }

    /// Sends a suspending call through `proxy` and waits for the callback to deliver its result.
    pub async fn invoke_suspending(&self, proxy: &OutboundService, signature: &str, args: String) -> Result<String> {
        let state = proxy.state.clone();
        if state.is_closed() {
            return Err(state.closed_error());
        }

        self.inner.listener.call_start(&state.name, signature);
        let result = self.suspend_on(&state, signature, args).await;
        self.inner.listener.call_end(&state.name, signature, &result);
        result
    }

    async fn suspend_on(&self, state: &Arc<ProxyState>, signature: &str, args: String) -> Result<String> {
        let callback = self.next_callback_name();
        let (sender, receiver) = oneshot::channel();

        self.inner.callbacks.insert(callback.clone(), sender);
        state.outstanding.insert(callback.clone());

        let mut pending = PendingCall {
            endpoint: self.clone(),
            state: state.clone(),
            callback: callback.clone(),
            resolved: false,
        };

        // a close racing with registration may have missed this callback
        if state.is_closed() {
            return Err(state.closed_error());
        }

        let call = CallEnvelope::new(state.name.clone(), signature, args).with_callback(callback);
        match self.call_outbound(&call)? {
            Response::Result(_) => {}
            Response::Failure(failure) => return Err(remote_failure(&state.name, signature, failure)),
            Response::UnknownService => {
                self.close_proxy_state(state, false);
                return Err(state.closed_error());
            }
        }

        let outcome = receiver.await;
        pending.resolved = true;

        match outcome {
            Ok(Response::Result(result)) => Ok(result),
            Ok(Response::Failure(failure)) => Err(Error::Remote(failure)),
            // sender dropped: the proxy was closed while waiting
            Ok(Response::UnknownService) | Err(_) => Err(state.closed_error()),
        }
    }

    /// Marks a proxy closed and fails its outstanding suspending calls.
    pub(crate) fn close_proxy_state(&self, state: &Arc<ProxyState>, notify_peer: bool) -> bool {
        if state.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(mut proxies) = self.inner.proxies.get_mut(&state.name) {
            proxies.retain(|w| w.upgrade().is_some_and(|s| !Arc::ptr_eq(&s, state)));
        }
        self.inner.proxies.remove_if(&state.name, |_, proxies| proxies.is_empty());

        let outstanding: Vec<String> = state.outstanding.iter().map(|c| c.key().clone()).collect();
        for callback in outstanding {
            state.outstanding.remove(&callback);
            // dropping the sender wakes the waiting caller
            self.inner.callbacks.remove(&callback);
        }

        tracing::debug!(endpoint = %self.inner.name, service = %state.name, "closed proxy");
        self.inner.listener.close_service(&state.name);

        if notify_peer {
            self.disconnect_peer(&state.name);
            // the peer registration is gone for every proxy sharing the name
            self.close_proxies_named(&state.name);
        }
        true
    }

    /// Drops bookkeeping for proxies released without `close()`.
    pub(crate) fn prune_proxies(&self) {
        self.inner.proxies.retain(|_, proxies| {
            proxies.retain(|w| w.strong_count() > 0);
            !proxies.is_empty()
        });
    }

    /// Closes every proxy named `name` after the peer reported it gone.
    pub(crate) fn close_proxies_named(&self, name: &str) -> bool {
        let states: Vec<Arc<ProxyState>> = self
            .inner
            .proxies
            .remove(name)
            .map(|(_, proxies)| proxies.into_iter().filter_map(|w| w.upgrade()).collect())
            .unwrap_or_default();

        let mut closed = false;
        for state in states {
            closed |= self.close_proxy_state(&state, false);
        }
        closed
    }
}

/// Recovers a signature mismatch reported by the peer; any other failure is remote.
fn remote_failure(service: &str, signature: &str, failure: String) -> Error {
    let mismatch = Error::SignatureMismatch { service: service.to_string(), signature: signature.to_string() };
    if failure == mismatch.to_string() {
        return mismatch;
    }
    Error::Remote(failure)
}
