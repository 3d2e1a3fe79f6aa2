//! Suspending calls: acknowledgement, callback delivery, cancellation and close.

use std::sync::Arc;
use std::time::Duration;

use neobridge::Endpoint;
use neobridge::Error;
use neobridge::Response;
use neobridge::testing::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn test_suspending_round_trip() -> anyhow::Result<()> {
    init_tracing();
    let (host, guest) = new_endpoint_pair();
    guest.bind("math", Arc::new(MathService::new()))?;
    let math = host.take("math", &math_interface())?;

    let sum: i64 = math.call_suspending(SLOW_ADD, &(20, 22)).await?;
    assert_eq!(sum, 42);

    let echo_reply = {
        guest.bind("echo", Arc::new(EchoService))?;
        let echo = host.take("echo", &echo_interface())?;
        echo.call_suspending::<_, String>(ECHO_LATER, "later").await?
    };
    assert_eq!(echo_reply, "later");
    Ok(())
}

#[tokio::test]
async fn test_suspending_failure_is_remote() -> anyhow::Result<()> {
    let (host, guest) = new_endpoint_pair();
    guest.bind("failing", Arc::new(FailingService))?;
    let failing = host.take("failing", &failing_interface())?;

    let err = failing.invoke_suspending(FAIL_LATER, "").await.unwrap_err();
    assert_eq!(err, Error::Remote("boom later".into()));
    Ok(())
}

#[tokio::test]
async fn test_suspending_unknown_service_closes_proxy() -> anyhow::Result<()> {
    let (host, _guest) = new_endpoint_pair();
    let ghost = host.take("ghost", &math_interface())?;

    let err = ghost.invoke_suspending(SLOW_ADD, "[1,2]").await.unwrap_err();
    assert_eq!(err, Error::ServiceClosed("ghost".into()));
    assert!(ghost.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_delivery_resolves_once() -> anyhow::Result<()> {
    init_tracing();
    let host = Endpoint::new("host");
    let guest = Endpoint::new("guest");
    let duplicating = Arc::new(DuplicatingChannel::new(host.inbound_channel()));
    host.connect(guest.inbound_channel())?;
    guest.connect(duplicating.clone())?;

    guest.bind("echo", Arc::new(EchoService))?;
    let echo = host.take("echo", &echo_interface())?;

    let reply: String = echo.call_suspending(ECHO_LATER, "once").await?;
    assert_eq!(reply, "once");

    let duplicates = duplicating.duplicate_responses();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(Response::decode(&duplicates[0])?, Response::UnknownService);
    Ok(())
}

#[tokio::test]
async fn test_dropping_caller_cancels_callee() -> anyhow::Result<()> {
    init_tracing();
    let (host, guest) = new_endpoint_pair();
    let gate = Arc::new(GateService::new());
    guest.bind("gate", gate.clone())?;
    let proxy = host.take("gate", &gate_interface())?;

    let entered = gate.entered.clone();
    tokio::select! {
        _ = proxy.invoke_suspending(WAIT, "") => panic!("gate was never released"),
        _ = entered.notified() => {}
    }

    eventually(|| gate.was_dropped()).await;

    // cancelling a call leaves the service bound
    assert!(!proxy.is_closed());
    assert_eq!(guest.service_names().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_closing_proxy_fails_outstanding_call() -> anyhow::Result<()> {
    init_tracing();
    let (host, guest) = new_endpoint_pair();
    let gate = Arc::new(GateService::new());
    guest.bind("gate", gate.clone())?;
    let proxy = host.take("gate", &gate_interface())?;

    let waiting = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.invoke_suspending(WAIT, "").await })
    };

    gate.entered.notified().await;
    assert!(proxy.close());

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiting).await??;
    assert_eq!(outcome.unwrap_err(), Error::ServiceClosed("gate".into()));

    eventually(|| gate.was_dropped()).await;
    assert!(guest.service_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_closing_service_fails_peer_call() -> anyhow::Result<()> {
    let (host, guest) = new_endpoint_pair();
    let gate = Arc::new(GateService::new());
    guest.bind("gate", gate.clone())?;
    let proxy = host.take("gate", &gate_interface())?;

    let waiting = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.invoke_suspending(WAIT, "").await })
    };

    gate.entered.notified().await;
    assert!(guest.close_service("gate"));

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiting).await??;
    assert_eq!(outcome.unwrap_err(), Error::ServiceClosed("gate".into()));
    assert!(proxy.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_closing_one_proxy_fails_calls_on_its_siblings() -> anyhow::Result<()> {
    init_tracing();
    let (host, guest) = new_endpoint_pair();
    let gate = Arc::new(GateService::new());
    guest.bind("gate", gate.clone())?;
    let first = host.take("gate", &gate_interface())?;
    let second = host.take("gate", &gate_interface())?;

    let waiting = {
        let second = second.clone();
        tokio::spawn(async move { second.invoke_suspending(WAIT, "").await })
    };

    gate.entered.notified().await;
    assert!(first.close());

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiting).await??;
    assert_eq!(outcome.unwrap_err(), Error::ServiceClosed("gate".into()));
    assert!(second.is_closed());
    assert!(host.client_names().is_empty());
    assert!(guest.service_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_suspending_signature_mismatch() -> anyhow::Result<()> {
    let (host, guest) = new_endpoint_pair();
    guest.bind("gate", Arc::new(GateService::new()))?;
    let gate = host.take("gate", &gate_interface())?;

    let signature = "suspend fun await(kotlin.Int): kotlin.Unit";
    let err = gate.invoke_suspending(signature, "[1]").await.unwrap_err();
    assert_eq!(err, Error::SignatureMismatch { service: "gate".into(), signature: signature.into() });
    Ok(())
}

#[tokio::test]
async fn test_released_gate_completes() -> anyhow::Result<()> {
    let (host, guest) = new_endpoint_pair();
    let gate = Arc::new(GateService::new());
    guest.bind("gate", gate.clone())?;
    let proxy = host.take("gate", &gate_interface())?;

    gate.release.notify_one();
    let () = proxy.call_suspending(WAIT, &()).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_suspending_calls() -> anyhow::Result<()> {
    init_tracing();
    let (host, guest) = new_endpoint_pair();
    guest.bind("math", Arc::new(MathService::new()))?;
    let math = host.take("math", &math_interface())?;

    let calls = (0..64i64).map(|i| {
        let math = math.clone();
        tokio::spawn(async move { math.call_suspending::<_, i64>(SLOW_ADD, &(i, i)).await })
    });

    let results = futures::future::try_join_all(calls).await?;
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result?, 2 * i as i64);
    }
    Ok(())
}
