//! Bridge Integration Tests
//!
//! Drives a `Bridge` end to end against an in-memory guest: readiness
//! sequencing, call correlation, teardown and guest → host dispatch.

mod support;

use jsbridge_host::{
    Bridge, BridgeConfig, BridgeError, HostError, HostFunction, InitializationError,
    ReadinessState, StructuredError, UnregisteredMethodPolicy, INTEROP_RUNTIME,
};
use serde_json::json;
use std::time::Duration;
use support::{ready_bridge, refusing_transport, transport};

fn spawn_call(bridge: &Bridge, function: &str, args: Vec<&str>) -> tokio::task::JoinHandle<jsbridge_host::Result<String>> {
    let bridge = bridge.clone();
    let function = function.to_string();
    let args = args.into_iter().map(String::from).collect();
    tokio::spawn(async move { bridge.call_raw(&function, args).await })
}

// ============================================================================
// Readiness
// ============================================================================

#[tokio::test]
async fn test_calls_wait_for_library_boot() {
    support::init_tracing();
    let (transport, events, mut guest) = transport();
    let bridge = Bridge::new(transport, events, "function add(a, b) { return a + b; }", BridgeConfig::default());
    assert_eq!(bridge.state(), ReadinessState::AwaitingTransportLoad);

    let call = spawn_call(&bridge, "add", vec!["1", "2"]);

    guest.loaded();
    assert_eq!(guest.next_script().await, INTEROP_RUNTIME);
    let boot = guest.next_script().await;
    assert!(boot.starts_with("__jsbridge.boot("), "{boot}");
    assert!(boot.contains("function add(a, b)"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(guest.drain_scripts().is_empty(), "nothing runs before the library booted");
    assert_eq!(bridge.state(), ReadinessState::RunningUserCode);

    guest.boot_succeeded();
    let (id, script) = guest.next_invoke().await;
    assert_eq!(id, 1);
    assert_eq!(script, r#"__jsbridge.invoke(1, "add", [1,2]);"#);

    guest.resolve(id, "3");
    assert_eq!(call.await.unwrap().unwrap(), "3");
    assert_eq!(bridge.state(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_page_request_follows_config() {
    let (transport, events, guest) = transport();
    let config = BridgeConfig::default()
        .with_origin("https://example.com")
        .with_incognito(true);
    let _bridge = Bridge::new(transport, events, "", config);

    let pages = guest.pages();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].origin, "https://example.com");
    assert!(pages[0].incognito);
}

#[tokio::test]
async fn test_library_failure_is_sticky() {
    let (transport, events, guest) = transport();
    let bridge = Bridge::new(transport, events, "throw new SyntaxError('bad')", BridgeConfig::default());

    guest.loaded();
    guest.reject(0, json!({"name": "SyntaxError", "message": "bad", "stack": "at boot", "line": 1, "column": 7}));

    let err = bridge.ready().await.unwrap_err();
    let expected = StructuredError {
        name: "SyntaxError".into(),
        message: "bad".into(),
        stack: "at boot".into(),
        line: 1,
        column: 7,
        code: None,
    };
    assert_eq!(err, BridgeError::Initialization(InitializationError::LibraryThrew(expected)));

    // Every later operation reports the same failure.
    assert_eq!(bridge.call_raw("add", vec![]).await.unwrap_err(), err);
    assert_eq!(bridge.register("Host.f", HostFunction::from_sync(|_| Ok("1".into()))).await.unwrap_err(), err);
    assert_eq!(bridge.ready().await.unwrap_err(), err);

    // A late success on the reserved id changes nothing.
    guest.boot_succeeded();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(bridge.state(), ReadinessState::Failed(_)));
}

#[tokio::test]
async fn test_load_failure_event() {
    let (transport, events, guest) = transport();
    let bridge = Bridge::new(transport, events, "", BridgeConfig::default());

    guest.load_failed("net::ERR_ABORTED");
    let err = bridge.ready().await.unwrap_err();
    assert_eq!(
        err,
        BridgeError::Initialization(InitializationError::TransportLoad("net::ERR_ABORTED".into()))
    );
}

#[tokio::test]
async fn test_load_refused_synchronously() {
    let (transport, events, _guest) = refusing_transport();
    let bridge = Bridge::new(transport, events, "", BridgeConfig::default());

    let err = bridge.ready().await.unwrap_err();
    assert!(
        matches!(err, BridgeError::Initialization(InitializationError::TransportLoad(_))),
        "{err:?}"
    );
}

#[test]
fn test_construction_outside_runtime_fails_gate() {
    let (transport, events, _guest) = transport();
    let bridge = Bridge::new(transport, events, "", BridgeConfig::default());
    assert!(matches!(bridge.state(), ReadinessState::Failed(BridgeError::Transport(_))));
}

// ============================================================================
// Host → Guest Calls
// ============================================================================

#[tokio::test]
async fn test_out_of_order_responses() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let first = spawn_call(&bridge, "slow", vec![]);
    let (first_id, _) = guest.next_invoke().await;
    let second = spawn_call(&bridge, "fast", vec![]);
    let (second_id, _) = guest.next_invoke().await;
    assert_ne!(first_id, second_id);
    assert_eq!(bridge.pending_calls(), 2);

    guest.resolve(second_id, "\"fast\"");
    assert_eq!(second.await.unwrap().unwrap(), "\"fast\"");
    guest.resolve(first_id, "\"slow\"");
    assert_eq!(first.await.unwrap().unwrap(), "\"slow\"");
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_guest_rejection() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let call = spawn_call(&bridge, "failing", vec![]);
    let (id, _) = guest.next_invoke().await;
    guest.reject(id, json!({"name": "TypeError", "message": "nope", "code": "E_TEST"}));

    let err = call.await.unwrap().unwrap_err();
    let structured = err.structured().unwrap();
    assert_eq!(structured.name, "TypeError");
    assert_eq!(structured.message, "nope");
    assert_eq!(structured.stack, "<unknown>");
    assert_eq!(structured.code.as_deref(), Some("E_TEST"));
}

#[tokio::test]
async fn test_non_object_rejection_takes_defaults() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let call = spawn_call(&bridge, "throwsNull", vec![]);
    let (id, _) = guest.next_invoke().await;
    guest.reject(id, json!(null));

    assert_eq!(
        call.await.unwrap().unwrap_err(),
        BridgeError::Guest(StructuredError::default())
    );
}

#[tokio::test]
async fn test_spurious_and_malformed_messages_are_ignored() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    guest.resolve(99, "1");
    guest.post("not json");
    guest.post(r#"{"result":"1"}"#);

    let call = spawn_call(&bridge, "value", vec![]);
    let (id, _) = guest.next_invoke().await;
    guest.resolve(id, "7");
    guest.resolve(id, "8");
    assert_eq!(call.await.unwrap().unwrap(), "7");
    assert_eq!(bridge.state(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_invalid_argument_fragment() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let err = bridge
        .call_raw("f", vec!["1".into(), "{bad".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument { index: 1, .. }), "{err:?}");
    assert_eq!(bridge.pending_calls(), 0);
    assert!(guest.drain_scripts().is_empty());
}

#[tokio::test]
async fn test_evaluation_failure_releases_call() {
    let (bridge, guest) = ready_bridge(BridgeConfig::default()).await;
    guest.refuse_scripts();

    let err = bridge.call_raw("f", vec![]).await.unwrap_err();
    assert_eq!(err, BridgeError::Transport("evaluation refused".into()));
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_cancelled_call_releases_its_slot() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let waited = tokio::time::timeout(Duration::from_millis(20), bridge.call_raw("never", vec![])).await;
    assert!(waited.is_err());
    assert_eq!(bridge.pending_calls(), 0);

    // The response arrives after the caller gave up.
    let (id, _) = guest.next_invoke().await;
    guest.resolve(id, "1");

    let call = spawn_call(&bridge, "later", vec![]);
    let (next, _) = guest.next_invoke().await;
    assert!(next > id);
    guest.resolve(next, "2");
    assert_eq!(call.await.unwrap().unwrap(), "2");
    assert_eq!(bridge.state(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_aborted_call_task_releases_its_slot() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let call = spawn_call(&bridge, "never", vec![]);
    guest.next_invoke().await;
    assert_eq!(bridge.pending_calls(), 1);

    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_typed_call() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let caller = bridge.clone();
    let call = tokio::spawn(async move { caller.call::<i64>("(a, b) => a + b", (40, 2)).await });
    let (id, script) = guest.next_invoke().await;
    assert!(script.ends_with(", [40,2]);"), "{script}");
    guest.resolve(id, "42");
    assert_eq!(call.await.unwrap().unwrap(), 42);

    let caller = bridge.clone();
    let call = tokio::spawn(async move { caller.call::<Option<i64>>("App.reset", ()).await });
    let (id, _) = guest.next_invoke().await;
    guest.resolve(id, "null");
    assert_eq!(call.await.unwrap().unwrap(), None);
}

#[tokio::test]
async fn test_typed_call_with_wrong_result_type() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let caller = bridge.clone();
    let call = tokio::spawn(async move { caller.call::<i64>("name", ()).await });
    let (id, _) = guest.next_invoke().await;
    guest.resolve(id, "\"text\"");
    assert!(matches!(call.await.unwrap(), Err(BridgeError::Serialization(_))));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_termination_rejects_outstanding_calls() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let first = spawn_call(&bridge, "never", vec![]);
    guest.next_invoke().await;
    let second = spawn_call(&bridge, "never", vec![]);
    guest.next_invoke().await;

    guest.terminate("render process gone");
    let expected = BridgeError::Terminated("render process gone".into());
    assert_eq!(first.await.unwrap().unwrap_err(), expected);
    assert_eq!(second.await.unwrap().unwrap_err(), expected);
    assert_eq!(bridge.pending_calls(), 0);
    assert!(guest.is_closed());

    assert_eq!(bridge.call_raw("later", vec![]).await.unwrap_err(), expected);
}

#[tokio::test]
async fn test_close_rejects_outstanding_calls() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    let call = spawn_call(&bridge, "never", vec![]);
    guest.next_invoke().await;

    bridge.close();
    assert_eq!(call.await.unwrap().unwrap_err(), BridgeError::Closed);
    assert_eq!(bridge.call_raw("later", vec![]).await.unwrap_err(), BridgeError::Closed);
    assert!(guest.is_closed());
}

#[tokio::test]
async fn test_close_during_initialization() {
    let (transport, events, _guest) = transport();
    let bridge = Bridge::new(transport, events, "", BridgeConfig::default());

    let waiter = bridge.clone();
    let ready = tokio::spawn(async move { waiter.ready().await });
    bridge.close();
    assert_eq!(ready.await.unwrap().unwrap_err(), BridgeError::Closed);
}

#[tokio::test]
async fn test_dropping_last_handle_closes_transport() {
    let (bridge, guest) = ready_bridge(BridgeConfig::default()).await;
    let clone = bridge.clone();
    drop(bridge);
    assert!(!guest.is_closed());
    drop(clone);
    assert!(guest.is_closed());
}

// ============================================================================
// Guest → Host Calls
// ============================================================================

#[tokio::test]
async fn test_registered_function_is_exposed_and_called() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge
        .register_fn("Host.add", |(a, b): (i64, i64)| Ok(a + b))
        .await
        .unwrap();
    assert_eq!(guest.next_script().await, r#"__jsbridge.expose("Host.add");"#);
    assert_eq!(bridge.registered(), vec!["Host.add".to_string()]);

    guest.invoke(1, "Host.add", &["1", "2"]);
    assert_eq!(guest.next_script().await, r#"__jsbridge.resolve(1, "3");"#);
}

#[tokio::test]
async fn test_registration_replaces_previous() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge.register_fn("Host.version", |()| Ok(1)).await.unwrap();
    bridge.register_fn("Host.version", |()| Ok(2)).await.unwrap();
    guest.drain_scripts();

    guest.invoke(5, "Host.version", &[]);
    assert_eq!(guest.next_script().await, r#"__jsbridge.resolve(5, "2");"#);
    assert_eq!(bridge.registered().len(), 1);
}

#[tokio::test]
async fn test_namespace_registration() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge.register_namespace("Host.storage").await.unwrap();
    assert_eq!(guest.next_script().await, r#"__jsbridge.namespace("Host.storage");"#);
}

#[tokio::test]
async fn test_invalid_names_are_refused() {
    let (bridge, _guest) = ready_bridge(BridgeConfig::default()).await;

    let err = bridge.register_fn("Host..add", |()| Ok(0)).await.unwrap_err();
    assert_eq!(err, BridgeError::InvalidName("Host..add".into()));
    let err = bridge.register_namespace("1st").await.unwrap_err();
    assert_eq!(err, BridgeError::InvalidName("1st".into()));
}

#[tokio::test]
async fn test_host_failure_is_sent_to_guest() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge
        .register(
            "Host.fail",
            HostFunction::from_sync(|_| {
                Err(StructuredError::new("RangeError", "too big").with_code("E_RANGE").into())
            }),
        )
        .await
        .unwrap();
    guest.drain_scripts();

    guest.invoke(3, "Host.fail", &["1e99"]);
    let script = guest.next_script().await;
    assert!(script.starts_with("__jsbridge.reject(3, "), "{script}");
    assert!(script.contains(r#""name":"RangeError""#), "{script}");
    assert!(script.contains(r#""code":"E_RANGE""#), "{script}");
}

#[tokio::test]
async fn test_host_argument_type_error() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge.register_fn("Host.square", |(n,): (i64,)| Ok(n * n)).await.unwrap();
    guest.drain_scripts();

    guest.invoke(1, "Host.square", &["\"four\""]);
    let script = guest.next_script().await;
    assert!(script.starts_with("__jsbridge.reject(1, "), "{script}");
    assert!(script.contains(r#""name":"TypeError""#), "{script}");
}

#[tokio::test]
async fn test_host_panic_is_sent_to_guest() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge
        .register("Host.boom", HostFunction::from_sync(|_| panic!("boom")))
        .await
        .unwrap();
    guest.drain_scripts();

    guest.invoke(2, "Host.boom", &[]);
    let script = guest.next_script().await;
    assert!(script.starts_with("__jsbridge.reject(2, "), "{script}");
    assert!(script.contains("host function Host.boom panicked"), "{script}");
}

#[tokio::test]
async fn test_async_host_functions_run_concurrently() {
    let (bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    bridge
        .register_async("Host.slow", |(ms,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, HostError>("slow")
        })
        .await
        .unwrap();
    bridge.register_fn("Host.fast", |()| Ok("fast")).await.unwrap();
    guest.drain_scripts();

    guest.invoke(1, "Host.slow", &["100"]);
    guest.invoke(2, "Host.fast", &[]);
    assert_eq!(guest.next_script().await, r#"__jsbridge.resolve(2, "\"fast\"");"#);
    assert_eq!(guest.next_script().await, r#"__jsbridge.resolve(1, "\"slow\"");"#);
}

#[tokio::test]
async fn test_unregistered_method_is_rejected() {
    let (_bridge, mut guest) = ready_bridge(BridgeConfig::default()).await;

    guest.invoke(4, "Host.missing", &[]);
    let script = guest.next_script().await;
    assert!(script.starts_with("__jsbridge.reject(4, "), "{script}");
    assert!(script.contains(r#""name":"ReferenceError""#), "{script}");
    assert!(script.contains(r#""code":"E_METHOD_NOT_FOUND""#), "{script}");
}

#[tokio::test]
async fn test_unregistered_method_can_be_dropped() {
    let config = BridgeConfig::default().with_unregistered_method(UnregisteredMethodPolicy::Drop);
    let (bridge, mut guest) = ready_bridge(config).await;
    bridge.register_fn("Host.ping", |()| Ok("pong")).await.unwrap();
    guest.drain_scripts();

    guest.invoke(1, "Host.missing", &[]);
    guest.invoke(2, "Host.ping", &[]);
    assert_eq!(guest.next_script().await, r#"__jsbridge.resolve(2, "\"pong\"");"#);
}
