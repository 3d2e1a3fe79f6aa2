use std::sync::Arc;

use crate::*;
use crate::testing::*;

fn raw(endpoint: &Endpoint, call: CallEnvelope) -> Response {
    let reply = endpoint.inbound_channel().call(&call.encode().unwrap()).unwrap();
    Response::decode(&reply).unwrap()
}

fn bound_math() -> Endpoint {
    let endpoint = Endpoint::new("guest");
    endpoint.bind("math", Arc::new(MathService::new())).unwrap();
    endpoint
}

#[test]
fn test_dispatch_sync_call() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("math", ADD, "[2,3]"));
    assert_eq!(response, Response::Result("5".into()));
}

#[test]
fn test_dispatch_property() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("math", LABEL, ""));
    assert_eq!(response, Response::Result("\"math\"".into()));
}

#[test]
fn test_dispatch_unknown_service() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("ghost", ADD, "[1,1]"));
    assert_eq!(response, Response::UnknownService);
}

#[test]
fn test_dispatch_signature_mismatch() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("math", "fun add(kotlin.Int): kotlin.Int", "[1]"));

    let Response::Failure(message) = response else { panic!("expected failure, got {:?}", response) };
    assert!(message.contains("fun add(kotlin.Int): kotlin.Int"), "{}", message);
}

#[test]
fn test_dispatch_builtin_service_type() {
    let endpoint = bound_math();
    let Response::Result(text) = raw(&endpoint, CallEnvelope::new("math", SERVICE_TYPE_SIGNATURE, "")) else {
        panic!("expected result");
    };

    let service_type: neosig::ServiceType = decode(&text).unwrap();
    assert_eq!(service_type, math_interface().service_type().unwrap());
}

#[test]
fn test_suspending_member_requires_callback() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("math", SLOW_ADD, "[1,2]"));
    assert!(matches!(response, Response::Failure(_)));
}

#[test]
fn test_plain_member_rejects_callback() {
    let endpoint = bound_math();
    let response = raw(&endpoint, CallEnvelope::new("math", ADD, "[1,2]").with_callback("host/callback/1"));
    assert!(matches!(response, Response::Failure(_)));
}

#[test]
fn test_suspending_call_without_runtime_fails() {
    let endpoint = bound_math();
    let call = CallEnvelope::new("math", SLOW_ADD, "[1,2]").with_callback("host/callback/1");

    let Response::Failure(message) = raw(&endpoint, call) else { panic!("expected failure") };
    assert!(message.contains("runtime"), "{}", message);
    assert!(endpoint.inner.suspended.is_empty());
}

#[test]
fn test_malformed_envelope_is_protocol_error() {
    let endpoint = bound_math();
    let err = endpoint.inbound_channel().call("{").unwrap_err();
    assert!(matches!(err, TransportError::Protocol(_)));
}

#[test]
fn test_dropped_endpoint_loses_connection() {
    let channel = Endpoint::new("gone").inbound_channel();
    let err = channel.call(&CallEnvelope::new("x", ADD, "").encode().unwrap()).unwrap_err();

    assert!(matches!(err, TransportError::ConnectionLost(_)));
    assert!(!channel.disconnect("x"));
}

#[test]
fn test_panicking_service_becomes_failure() {
    let endpoint = Endpoint::new("guest");
    endpoint.bind("failing", Arc::new(FailingService)).unwrap();

    let response = raw(&endpoint, CallEnvelope::new("failing", PANIC, ""));
    assert_eq!(response, Response::Failure("kaboom".into()));

    // the endpoint keeps serving after a panic
    let response = raw(&endpoint, CallEnvelope::new("failing", FAIL, ""));
    assert_eq!(response, Response::Failure("boom".into()));
}

#[test]
fn test_callback_names_are_unique_and_scoped() {
    let endpoint = Endpoint::new("host");
    let first = endpoint.next_callback_name();
    let second = endpoint.next_callback_name();

    assert!(first.starts_with("host/callback/"));
    assert_ne!(first, second);
}

#[test]
fn test_callback_rejects_other_signatures() {
    let endpoint = Endpoint::new("host");
    let (sender, _receiver) = tokio::sync::oneshot::channel();
    endpoint.inner.callbacks.insert("host/callback/9".into(), sender);

    let response = raw(&endpoint, CallEnvelope::new("host/callback/9", ADD, "[1,1]"));
    assert!(matches!(response, Response::Failure(_)));
    assert!(endpoint.inner.callbacks.contains_key("host/callback/9"));
}

#[test]
fn test_callback_resolves_once() {
    let endpoint = Endpoint::new("host");
    let (sender, mut receiver) = tokio::sync::oneshot::channel();
    endpoint.inner.callbacks.insert("host/callback/9".into(), sender);

    let args = Response::Result("7".into()).encode().unwrap();
    let call = CallEnvelope::new("host/callback/9", RESUME_SIGNATURE, args);

    assert_eq!(raw(&endpoint, call.clone()), Response::ack());
    assert_eq!(raw(&endpoint, call), Response::UnknownService);
    assert_eq!(receiver.try_recv().unwrap(), Response::Result("7".into()));
}

#[test]
fn test_bind_rejects_callback_name() {
    let endpoint = Endpoint::new("host");
    let (sender, _receiver) = tokio::sync::oneshot::channel();
    endpoint.inner.callbacks.insert("host/callback/1".into(), sender);

    let err = endpoint.bind("host/callback/1", Arc::new(EchoService)).unwrap_err();
    assert_eq!(err, Error::NameAlreadyBound("host/callback/1".into()));
}

#[test]
fn test_connect_twice_fails() {
    let (host, guest) = new_endpoint_pair();
    assert!(host.is_connected());
    assert_eq!(host.connect(guest.inbound_channel()).unwrap_err(), Error::AlreadyConnected);
}

#[test]
fn test_proxy_bookkeeping_released_on_close() {
    let (host, guest) = new_endpoint_pair();
    guest.bind("echo", Arc::new(EchoService)).unwrap();

    let proxy = host.take("echo", &echo_interface()).unwrap();
    assert_eq!(host.inner.proxies.len(), 1);

    proxy.close();
    assert!(host.inner.proxies.is_empty());
    assert!(guest.inner.services.is_empty());
}

#[test]
fn test_dropped_proxies_are_pruned() {
    let (host, _guest) = new_endpoint_pair();
    for name in ["a", "b", "c"] {
        let _ = host.take(name, &echo_interface()).unwrap();
    }
    let kept = host.take("kept", &echo_interface()).unwrap();

    assert_eq!(host.client_names().into_iter().collect::<Vec<_>>(), ["kept"]);
    assert_eq!(host.inner.proxies.len(), 1);
    drop(kept);

    assert!(host.client_names().is_empty());
    assert!(host.inner.proxies.is_empty());
}

#[test]
fn test_other_failures_stay_remote() {
    let (host, guest) = new_endpoint_pair();
    guest.bind("failing", Arc::new(FailingService)).unwrap();
    let failing = host.take("failing", &failing_interface()).unwrap();

    assert_eq!(failing.invoke(FAIL, "").unwrap_err(), Error::Remote("boom".into()));
}
