//! Test fixtures: sample services, a recording listener and channel wrappers.
//!
//! Used by the crate's own test suites and by downstream crates testing their
//! bindings; not intended for production wiring.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use neosig::FunctionDecl;
use neosig::Interface;
use neosig::PropertyDecl;
use neosig::ServiceType;
use neosig::TypeRef;
use tokio::sync::Notify;

use crate::channel;
use crate::channel::CallChannel;
use crate::codec;
use crate::endpoint::Endpoint;
use crate::endpoint::pair;
use crate::envelope::CallEnvelope;
use crate::envelope::RESUME_SIGNATURE;
use crate::error::Result;
use crate::events::EventListener;
use crate::service::CallResult;
use crate::service::Failure;
use crate::service::Service;

pub const ADD: &str = "fun add(kotlin.Int, kotlin.Int): kotlin.Int";
pub const SLOW_ADD: &str = "suspend fun slowAdd(kotlin.Int, kotlin.Int): kotlin.Int";
pub const LABEL: &str = "val label: kotlin.String";

pub const ECHO: &str = "fun echo(kotlin.String): kotlin.String";
pub const ECHO_LATER: &str = "suspend fun echoLater(kotlin.String): kotlin.String";

pub const FAIL: &str = "fun fail(): kotlin.Unit";
pub const PANIC: &str = "fun panic(): kotlin.Unit";
pub const FAIL_LATER: &str = "suspend fun failLater(): kotlin.Unit";

pub const WAIT: &str = "suspend fun await(): kotlin.Unit";

fn int() -> TypeRef {
    TypeRef::class("kotlin.Int")
}

fn string() -> TypeRef {
    TypeRef::class("kotlin.String")
}

fn unit() -> TypeRef {
    TypeRef::class("kotlin.Unit")
}

/// Creates two endpoints, `host` and `guest`, connected to each other.
pub fn new_endpoint_pair() -> (Endpoint, Endpoint) {
    let host = Endpoint::new("host");
    let guest = Endpoint::new("guest");
    // fresh endpoints are never connected
    let _ = pair(&host, &guest);
    (host, guest)
}

pub fn math_interface() -> Arc<Interface> {
    Arc::new(
        Interface::new("app.MathService")
            .extends(Interface::service_marker())
            .member(FunctionDecl::new("add", int()).param(int()).param(int()))
            .member(FunctionDecl::new("slowAdd", int()).suspending().param(int()).param(int()))
            .member(PropertyDecl::val("label", string())),
    )
}

pub fn echo_interface() -> Arc<Interface> {
    Arc::new(
        Interface::new("app.EchoService")
            .extends(Interface::service_marker())
            .member(FunctionDecl::new("echo", string()).param(string()))
            .member(FunctionDecl::new("echoLater", string()).suspending().param(string())),
    )
}

pub fn failing_interface() -> Arc<Interface> {
    Arc::new(
        Interface::new("app.FailingService")
            .extends(Interface::service_marker())
            .member(FunctionDecl::new("fail", unit()))
            .member(FunctionDecl::new("panic", unit()))
            .member(FunctionDecl::new("failLater", unit()).suspending()),
    )
}

pub fn gate_interface() -> Arc<Interface> {
    Arc::new(
        Interface::new("app.GateService")
            .extends(Interface::service_marker())
            .member(FunctionDecl::new("await", unit()).suspending()),
    )
}

/// Adds integers; `slowAdd` yields to the runtime before answering.
#[derive(Debug, Default)]
pub struct MathService {
    closed: AtomicBool,
}

impl MathService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn sum(args: &str) -> CallResult {
    let (a, b): (i64, i64) = codec::decode(args)?;
    Ok(codec::encode(&(a + b))?)
}

#[async_trait::async_trait]
impl Service for MathService {
    fn interface(&self) -> Arc<Interface> {
        math_interface()
    }

    fn call(&self, signature: &str, args: &str) -> CallResult {
        match signature {
            ADD => sum(args),
            LABEL => Ok(codec::encode("math")?),
            _ => Err(Failure::new(format!("no member '{}'", signature))),
        }
    }

    async fn call_suspending(&self, signature: &str, args: String) -> CallResult {
        match signature {
            SLOW_ADD => {
                tokio::task::yield_now().await;
                sum(&args)
            }
            _ => Err(Failure::new(format!("no suspending member '{}'", signature))),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Returns its argument.
#[derive(Debug, Default)]
pub struct EchoService;

#[async_trait::async_trait]
impl Service for EchoService {
    fn interface(&self) -> Arc<Interface> {
        echo_interface()
    }

    fn call(&self, signature: &str, args: &str) -> CallResult {
        match signature {
            ECHO => Ok(args.to_string()),
            _ => Err(Failure::new(format!("no member '{}'", signature))),
        }
    }

    async fn call_suspending(&self, signature: &str, args: String) -> CallResult {
        match signature {
            ECHO_LATER => Ok(args),
            _ => Err(Failure::new(format!("no suspending member '{}'", signature))),
        }
    }
}

/// Fails every call: by error, by panic, or after suspending.
#[derive(Debug, Default)]
pub struct FailingService;

#[async_trait::async_trait]
impl Service for FailingService {
    fn interface(&self) -> Arc<Interface> {
        failing_interface()
    }

    fn call(&self, signature: &str, _args: &str) -> CallResult {
        match signature {
            FAIL => Err(Failure::new("boom")),
            PANIC => panic!("kaboom"),
            _ => Err(Failure::new(format!("no member '{}'", signature))),
        }
    }

    async fn call_suspending(&self, _signature: &str, _args: String) -> CallResult {
        tokio::task::yield_now().await;
        Err(Failure::new("boom later"))
    }
}

/// Suspends until released. Records when its pending future is dropped.
#[derive(Debug, Default)]
pub struct GateService {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    pub dropped: Arc<AtomicBool>,
}

impl GateService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl Service for GateService {
    fn interface(&self) -> Arc<Interface> {
        gate_interface()
    }

    async fn call_suspending(&self, signature: &str, _args: String) -> CallResult {
        if signature != WAIT {
            return Err(Failure::new(format!("no suspending member '{}'", signature)));
        }
        let _flag = DropFlag(self.dropped.clone());
        self.entered.notify_one();
        self.release.notified().await;
        Ok(codec::encode(&())?)
    }
}

/// Records every event as a line of text.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl EventListener for RecordingListener {
    fn bind_service(&self, name: &str, service_type: &ServiceType) {
        self.record(format!("bind {} {}", name, service_type.name()));
    }

    fn take_service(&self, name: &str) {
        self.record(format!("take {}", name));
    }

    fn call_start(&self, name: &str, signature: &str) {
        self.record(format!("start {} {}", name, signature));
    }

    fn call_end(&self, name: &str, signature: &str, result: &Result<String>) {
        let outcome = if result.is_ok() { "ok" } else { "err" };
        self.record(format!("end {} {} {}", name, signature, outcome));
    }

    fn close_service(&self, name: &str) {
        self.record(format!("close {}", name));
    }
}

/// Forwards to another channel but delivers every callback result twice.
///
/// The response to each second delivery is kept for inspection.
pub struct DuplicatingChannel {
    inner: Arc<dyn CallChannel>,
    duplicates: Mutex<Vec<String>>,
}

impl DuplicatingChannel {
    pub fn new(inner: Arc<dyn CallChannel>) -> Self {
        Self { inner, duplicates: Mutex::new(Vec::new()) }
    }

    /// Encoded responses to the repeated deliveries.
    pub fn duplicate_responses(&self) -> Vec<String> {
        self.duplicates.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CallChannel for DuplicatingChannel {
    fn call(&self, call: &str) -> channel::Result<String> {
        let first = self.inner.call(call)?;

        let is_resume = CallEnvelope::decode(call).is_ok_and(|c| c.signature == RESUME_SIGNATURE);
        if is_resume {
            let second = self.inner.call(call)?;
            self.duplicates.lock().unwrap_or_else(PoisonError::into_inner).push(second);
        }
        Ok(first)
    }

    fn disconnect(&self, name: &str) -> bool {
        self.inner.disconnect(name)
    }
}

/// Fails every call with a transport fault.
#[derive(Debug, Default)]
pub struct BrokenChannel;

impl CallChannel for BrokenChannel {
    fn call(&self, _call: &str) -> channel::Result<String> {
        Err(channel::TransportError::ConnectionLost("broken".into()))
    }

    fn disconnect(&self, _name: &str) -> bool {
        false
    }
}
