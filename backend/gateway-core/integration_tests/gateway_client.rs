use crate::helpers::{
    MockGateway, client_for, client_for_closed_port, connected_client, default_responder,
    event_text, fast_tuning, scripted_gateway, wait_for_state, wait_until, wait_until_async,
};

use gateway_core::GatewayConfig;
use gateway_core::error::GatewayError;
use gateway_core::gateway::{ConnectionState, GatewayClient, RpcTuning};

use models::methods::CONNECT;
use models::{GatewayEvent, RequestFrame, ResponseFrame};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;

// ============================================================================
// Public API tests for the duplex RPC client, run against an in-process
// mock gateway on an ephemeral port.
// ============================================================================

fn record_states(client: &gateway_core::GatewayClient) -> Arc<Mutex<Vec<ConnectionState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    let _subscription = client.on_state_change(move |state| {
        sink.lock().expect("states lock").push(state);
    });
    states
}

// ----------------------------------------------------------------------------
// connect() / handshake
// ----------------------------------------------------------------------------

/// **VALUE**: A clean connect goes disconnected -> connecting -> connected,
/// with nothing in between and nothing repeated.
///
/// **WHY THIS MATTERS**: Consumers drive UI and polling from this stream; a
/// duplicate or missing transition would start or stop work spuriously.
///
/// **BUG THIS CATCHES**: Marking connected on transport open instead of on
/// handshake success, or notifying for same-state "transitions".
#[tokio::test]
async fn given_accepting_gateway_when_connect_then_state_sequence_is_connecting_connected() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = client_for(&mock);
    let states = record_states(&client);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // WHEN
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // THEN
    assert_eq!(
        *states.lock().expect("states lock"),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
}

/// **VALUE**: The first frame on the connection is the `connect` handshake
/// carrying protocol, client identity, role and token.
///
/// **BUG THIS CATCHES**: Sending application requests before the handshake,
/// or leaking an empty token as `auth: {token: ""}`.
#[tokio::test]
async fn given_token_configured_when_connect_then_handshake_carries_params() {
    // GIVEN
    let mock = MockGateway::start().await;
    let config = mock.config().with_token("secret-token");
    let client = gateway_core::GatewayClient::new(&config, crate::helpers::fast_tuning())
        .expect("client");

    // WHEN
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // THEN
    let requests = mock.requests();
    assert_eq!(requests[0].method, CONNECT);
    let params = requests[0].params.clone().expect("handshake params");
    assert_eq!(params["protocol"], json!(3));
    assert_eq!(params["role"], json!("control"));
    assert_eq!(params["client"]["name"], json!("gateway-core"));
    assert_eq!(params["auth"]["token"], json!("secret-token"));
}

#[tokio::test]
async fn given_connected_client_when_connect_called_again_then_no_second_transport() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    // WHEN
    client.connect();
    client.connect();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // THEN
    assert_eq!(mock.connection_count(), 1);
    assert_eq!(client.state(), ConnectionState::Connected);
}

/// **VALUE**: A rejected handshake never reaches `connected`; it closes and
/// retries on backoff.
///
/// **BUG THIS CATCHES**: Surfacing the rejection as a panic or error instead
/// of a state change, or giving up after the first failure.
#[tokio::test]
async fn given_gateway_rejects_handshake_when_connect_then_never_connected_and_retries() {
    // GIVEN
    let mock = MockGateway::start_with(Arc::new(|request: &RequestFrame| {
        Some(ResponseFrame::failure(&request.id, "UNAUTHORIZED", "bad token"))
    }))
    .await;
    let client = client_for(&mock);
    let states = record_states(&client);

    // WHEN
    client.connect();
    wait_until("two handshake attempts", || mock.connection_count() >= 2).await;

    // THEN
    let states = states.lock().expect("states lock").clone();
    assert!(!states.contains(&ConnectionState::Connected));
    assert_eq!(states[0], ConnectionState::Connecting);
    assert!(states.contains(&ConnectionState::Disconnected));

    client.disconnect().await;
}

#[tokio::test]
async fn given_nothing_listening_when_connect_then_error_then_disconnected() {
    // GIVEN
    let client = client_for_closed_port().await;
    let states = record_states(&client);

    // WHEN
    client.connect();
    wait_until("open failure observed", || {
        states.lock().expect("states lock").len() >= 3
    })
    .await;
    client.disconnect().await;

    // THEN
    let states = states.lock().expect("states lock").clone();
    assert_eq!(
        &states[..3],
        &[
            ConnectionState::Connecting,
            ConnectionState::Error,
            ConnectionState::Disconnected
        ]
    );
}

// ----------------------------------------------------------------------------
// request()
// ----------------------------------------------------------------------------

/// **VALUE**: Calling while not connected fails immediately with the
/// precondition error and sends nothing.
///
/// **BUG THIS CATCHES**: Queueing the call until connect, or waiting for the
/// full timeout before failing.
#[tokio::test]
async fn given_disconnected_client_when_request_then_not_connected_immediately() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = client_for(&mock);

    // WHEN
    let result = tokio::time::timeout(Duration::from_millis(50), client.health()).await;

    // THEN
    let result = result.expect("must not wait");
    assert!(matches!(result, Err(GatewayError::NotConnected { .. })));
    assert_eq!(client.pending_calls().await, 0);
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn given_connected_client_when_request_then_returns_payload() {
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    let payload = client.health().await.expect("health");

    assert_eq!(payload, json!({"status": "ok"}));
    assert_eq!(client.pending_calls().await, 0);
}

/// **VALUE**: Concurrent calls are paired by id, not by arrival order.
///
/// **BUG THIS CATCHES**: A FIFO assumption that hands one caller another
/// caller's payload.
#[tokio::test]
async fn given_concurrent_requests_when_answered_then_each_gets_its_own_payload() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    // WHEN
    let (a, b, c) = tokio::join!(
        client.request("echo", Some(json!({"n": 1}))),
        client.request("echo", Some(json!({"n": 2}))),
        client.request("echo", Some(json!({"n": 3}))),
    );

    // THEN
    assert_eq!(a.expect("a"), json!({"n": 1}));
    assert_eq!(b.expect("b"), json!({"n": 2}));
    assert_eq!(c.expect("c"), json!({"n": 3}));
}

#[tokio::test]
async fn given_server_rejects_method_when_request_then_protocol_error_with_server_message() {
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    let error = client.request("fail", None).await.expect_err("must fail");

    match error {
        GatewayError::Protocol { code, message, .. } => {
            assert_eq!(code, "INVALID_REQUEST");
            assert_eq!(message, "method rejected");
        }
        other => panic!("Expected protocol error, got {other:?}"),
    }
}

/// **VALUE**: A request with no response times out, leaves the pending set,
/// and the connection stays usable.
///
/// **BUG THIS CATCHES**: Leaking pending entries on timeout, or tearing the
/// connection down because one call was slow.
#[tokio::test]
async fn given_unanswered_request_when_timeout_elapses_then_timeout_error_and_pending_cleared() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    // WHEN
    let error = client.request("hang", None).await.expect_err("must time out");

    // THEN
    assert!(matches!(error, GatewayError::Timeout { .. }), "{error:?}");
    wait_until_async("pending cleared", || async { client.pending_calls().await == 0 }).await;
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.health().await.is_ok());
}

/// **VALUE**: A caller that stops waiting early does not leave its call
/// behind; the call still expires at its own deadline.
///
/// **WHY THIS MATTERS**: Callers wrap requests in their own timeouts and
/// `select!`s. Against a gateway that never answers, every abandoned call
/// would otherwise stay pending until the next disconnect.
///
/// **BUG THIS CATCHES**: Enforcing the deadline only inside the caller's
/// future, so dropping that future skips the cleanup.
#[tokio::test]
async fn given_caller_gives_up_early_when_deadline_passes_then_pending_cleared() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    // WHEN: The caller abandons an unanswered request well before the
    // request timeout
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.request("hang", None)).await;
    assert!(abandoned.is_err(), "hang must not be answered");
    assert_eq!(client.pending_calls().await, 1);

    // THEN: The call is dropped once its own deadline passes
    wait_until_async("abandoned call expired", || async {
        client.pending_calls().await == 0
    })
    .await;
    assert_eq!(client.state(), ConnectionState::Connected);
}

/// **VALUE**: Garbage text and responses for unknown ids are dropped without
/// any state change.
///
/// **BUG THIS CATCHES**: A parse error or missing map entry tearing down the
/// connection.
#[tokio::test]
async fn given_malformed_and_unknown_frames_when_received_then_ignored() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;
    let states = record_states(&client);

    // WHEN
    mock.send_raw("this is not json");
    mock.send_raw(r#"{"type":"mystery","id":"1"}"#);
    mock.send_raw(r#"{"type":"res","id":"no-such-call","ok":true,"payload":{}}"#);

    // THEN
    assert_eq!(client.health().await.expect("still usable"), json!({"status": "ok"}));
    assert!(states.lock().expect("states lock").is_empty());
    assert_eq!(client.state(), ConnectionState::Connected);
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// **VALUE**: An event reaches its named handlers and wildcard handlers;
/// unsubscribing removes only that registration.
///
/// **BUG THIS CATCHES**: Wildcard never firing, or unsubscribe dropping every
/// handler for the name.
#[tokio::test]
async fn given_named_and_wildcard_handlers_when_event_pushed_then_both_receive() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, GatewayEvent)>();

    let named_tx = tx.clone();
    let named = client.on("tick", move |event| {
        let _ = named_tx.send(("named".to_string(), event.clone()));
    });
    let wild_tx = tx.clone();
    let _wild = client.on("*", move |event| {
        let _ = wild_tx.send(("wild".to_string(), event.clone()));
    });

    // WHEN
    mock.push_event("tick", json!({"agentId": "a1"}));

    // THEN
    let first = rx.recv().await.expect("first delivery");
    let second = rx.recv().await.expect("second delivery");
    assert_eq!(first.0, "named");
    assert_eq!(second.0, "wild");
    assert_eq!(second.1.name, "tick");
    assert_eq!(second.1.payload, json!({"agentId": "a1"}));

    // WHEN: named handler unsubscribed
    named.unsubscribe();
    mock.push_event("tick", json!({"agentId": "a2"}));

    // THEN: only wildcard
    let only = rx.recv().await.expect("wildcard delivery");
    assert_eq!(only.0, "wild");
    assert_eq!(only.1.payload["agentId"], json!("a2"));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn given_panicking_handler_when_event_pushed_then_later_handlers_still_run() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _bad = client.on("presence", |_| panic!("consumer bug"));
    let _good = client.on("presence", move |event| {
        let _ = tx.send(event.payload.clone());
    });

    // WHEN
    mock.push_event("presence", json!({"a1": {}}));

    // THEN
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("delivered")
        .expect("payload");
    assert_eq!(payload, json!({"a1": {}}));
    assert_eq!(client.state(), ConnectionState::Connected);
}

// ----------------------------------------------------------------------------
// disconnect() / reconnection
// ----------------------------------------------------------------------------

/// **VALUE**: After disconnect no call is left pending, every in-flight call
/// has been rejected, and the client stays down.
///
/// **WHY THIS MATTERS**: Orphaned calls hang their callers forever.
///
/// **BUG THIS CATCHES**: Forgetting the pending map on close, or a
/// reconnect timer surviving an explicit disconnect.
#[tokio::test]
async fn given_in_flight_calls_when_disconnect_then_all_rejected_and_no_reconnect() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;
    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.request("hang", None).await })
        })
        .collect();
    wait_until_async("calls pending", || async { client.pending_calls().await == 3 }).await;

    // WHEN
    client.disconnect().await;

    // THEN
    assert_eq!(client.pending_calls().await, 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    for call in calls {
        let result = call.await.expect("task");
        assert!(
            matches!(result, Err(GatewayError::ConnectionClosed { .. })),
            "{result:?}"
        );
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(mock.connection_count(), 1, "No reconnect after disconnect");
}

/// **VALUE**: Events written before the handshake reply never reach
/// handlers; events after it do.
///
/// **WHY THIS MATTERS**: Handlers feed the live tier, which must only hold
/// data received while connected.
///
/// **BUG THIS CATCHES**: Dispatching events while still `Connecting`.
#[tokio::test]
async fn given_event_before_handshake_reply_when_connected_then_only_later_event_delivered() {
    // GIVEN: A gateway that pushes presence on both sides of its hello
    let port = scripted_gateway(
        vec![event_text("presence", json!({"ghost": {"status": "online"}}))],
        vec![event_text("presence", json!({"real": {"status": "online"}}))],
    )
    .await;
    let client = GatewayClient::new(&GatewayConfig::new("127.0.0.1", port), fast_tuning())
        .expect("Failed to build client");
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewayEvent>();
    let _presence = client.on("presence", move |event| {
        let _ = tx.send(event.clone());
    });

    // WHEN
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // THEN: Only the post-handshake snapshot arrives
    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("post-handshake event")
        .expect("channel open");
    assert!(first.payload.get("real").is_some(), "{:?}", first.payload);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "pre-handshake event was delivered");

    client.disconnect().await;
}

/// **VALUE**: The reconnect delay returns to its initial value after a
/// successful handshake, observed through the client.
///
/// **WHY THIS MATTERS**: After a rough start, a later drop should reconnect
/// quickly rather than inherit the grown delay.
///
/// **BUG THIS CATCHES**: Resetting the backoff on transport open (or never)
/// instead of on handshake success.
#[tokio::test]
async fn given_rejected_handshakes_then_success_when_dropped_then_reconnect_uses_initial_delay() {
    // GIVEN: The first three handshakes are rejected, so the delay grows
    // 150ms, 300ms, 600ms before the fourth attempt succeeds
    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handshakes);
    let mock = MockGateway::start_with(Arc::new(move |request: &RequestFrame| {
        if request.method == CONNECT && counter.fetch_add(1, Ordering::SeqCst) < 3 {
            return Some(ResponseFrame::failure(&request.id, "UNAVAILABLE", "warming up"));
        }
        default_responder(request)
    }))
    .await;
    let tuning = RpcTuning {
        request_timeout: Duration::from_millis(500),
        backoff_initial: Duration::from_millis(150),
        backoff_max: Duration::from_secs(10),
    };
    let client = GatewayClient::new(&mock.config(), tuning).expect("Failed to build client");
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(handshakes.load(Ordering::SeqCst), 4);
    let connections = mock.connection_count();

    // WHEN: The server drops the healthy connection
    let dropped_at = Instant::now();
    mock.drop_connections();
    wait_until("reconnect attempt", || mock.connection_count() > connections).await;

    // THEN: Well under the 1200ms the un-reset backoff would have waited
    let waited = dropped_at.elapsed();
    assert!(waited < Duration::from_millis(700), "reconnect took {waited:?}");
    wait_for_state(&client, ConnectionState::Connected).await;

    client.disconnect().await;
}

/// **VALUE**: A server-side drop reconnects automatically and the new
/// connection handshakes again.
///
/// **BUG THIS CATCHES**: Treating a clean close as final, or reusing the dead
/// transport.
#[tokio::test]
async fn given_connected_client_when_server_drops_then_reconnects() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;
    let states = record_states(&client);

    // WHEN
    mock.drop_connections();
    wait_until("second connection", || mock.connection_count() >= 2).await;
    wait_until("reconnected", || {
        states
            .lock()
            .expect("states lock")
            .ends_with(&[ConnectionState::Connecting, ConnectionState::Connected])
    })
    .await;

    // THEN
    let states = states.lock().expect("states lock").clone();
    assert_eq!(states[0], ConnectionState::Disconnected);
    assert_eq!(mock.requests_for(CONNECT).len(), 2);
    assert!(client.health().await.is_ok());
}

// ----------------------------------------------------------------------------
// Convenience wrappers
// ----------------------------------------------------------------------------

#[tokio::test]
async fn given_connected_client_when_agent_send_then_params_carry_idempotency_key() {
    // GIVEN
    let mock = MockGateway::start().await;
    let client = connected_client(&mock).await;

    // WHEN
    let result = client.agent_send("agent-7", "hello").await.expect("agent");

    // THEN
    assert_eq!(result, json!({"runId": "run-1"}));
    let sent = mock.requests_for("agent");
    let params = sent[0].params.clone().expect("params");
    assert_eq!(params["agentId"], json!("agent-7"));
    assert_eq!(params["message"], json!("hello"));
    assert!(!params["idempotencyKey"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn given_connected_client_when_cron_runs_then_method_and_params_fixed() {
    let mock = MockGateway::start_with(Arc::new(default_responder)).await;
    let client = connected_client(&mock).await;

    let echoed = client.cron_runs("job-1", Some(5)).await.expect("cron.runs");

    assert_eq!(echoed, json!({"id": "job-1", "limit": 5}));
    assert_eq!(mock.requests_for("cron.runs").len(), 1);
    assert!(client.cron_list().await.is_ok());
    assert!(client.cron_status().await.is_ok());
    assert!(client.presence().await.is_ok());
}
