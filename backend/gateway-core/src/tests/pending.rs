use crate::error::GatewayError;
use crate::gateway::pending::PendingCalls;

use models::ResponseFrame;

use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::Instant;

fn later() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

#[test]
fn given_pending_call_when_ok_response_resolved_then_caller_gets_payload() {
    // GIVEN
    let mut pending = PendingCalls::default();
    let (tx, mut rx) = oneshot::channel();
    pending.insert("1".to_string(), "health".to_string(), tx, later());

    // WHEN
    let matched = pending.resolve(ResponseFrame::success("1", json!({"ok": true})));

    // THEN
    assert!(matched);
    assert_eq!(pending.len(), 0);
    let result = rx.try_recv().expect("reply sent");
    assert_eq!(result.expect("ok response"), json!({"ok": true}));
}

/// **VALUE**: An `ok: false` response becomes a protocol error carrying the
/// server's code and message.
///
/// **BUG THIS CATCHES**: Failed responses resolving as `Ok(null)`, or the
/// server message being replaced by something generic.
#[test]
fn given_pending_call_when_failure_response_resolved_then_protocol_error_with_message() {
    // GIVEN
    let mut pending = PendingCalls::default();
    let (tx, mut rx) = oneshot::channel();
    pending.insert("7".to_string(), "cron.list".to_string(), tx, later());

    // WHEN
    pending.resolve(ResponseFrame::failure("7", "FORBIDDEN", "not allowed"));

    // THEN
    match rx.try_recv().expect("reply sent") {
        Err(GatewayError::Protocol {
            method,
            code,
            message,
            ..
        }) => {
            assert_eq!(method, "cron.list");
            assert_eq!(code, "FORBIDDEN");
            assert_eq!(message, "not allowed");
        }
        other => panic!("Expected protocol error, got {other:?}"),
    }
}

/// **VALUE**: A response for an id nobody is waiting on is reported as
/// unmatched and changes nothing.
///
/// **BUG THIS CATCHES**: A late response after a timeout resolving some other
/// caller, or panicking on a missing key.
#[test]
fn given_unknown_id_when_resolved_then_returns_false_and_keeps_other_calls() {
    let mut pending = PendingCalls::default();
    let (tx, _rx) = oneshot::channel();
    pending.insert("1".to_string(), "health".to_string(), tx, later());

    let matched = pending.resolve(ResponseFrame::success("999", json!(null)));

    assert!(!matched);
    assert_eq!(pending.len(), 1);
}

/// **VALUE**: A call past its deadline is failed with a timeout and removed,
/// even when its caller has already stopped listening.
///
/// **WHY THIS MATTERS**: A caller that gives up early (an outer timeout, a
/// cancelled task) must not leave its entry behind against a gateway that
/// never answers.
///
/// **BUG THIS CATCHES**: Expiry only reaching callers that are still waiting,
/// or a late response resolving an expired call.
#[test]
fn given_expired_and_live_calls_when_expire_then_only_expired_removed_with_timeout() {
    // GIVEN: One call already past its deadline with a live receiver, one
    // with its receiver dropped, and one far in the future
    let mut pending = PendingCalls::default();
    let now = Instant::now();
    let (expired_tx, mut expired_rx) = oneshot::channel();
    pending.insert("1".to_string(), "hang".to_string(), expired_tx, now);
    let (abandoned_tx, abandoned_rx) = oneshot::channel();
    drop(abandoned_rx);
    pending.insert("2".to_string(), "hang".to_string(), abandoned_tx, now);
    let (live_tx, _live_rx) = oneshot::channel();
    pending.insert("3".to_string(), "health".to_string(), live_tx, later());

    // WHEN
    let expired = pending.expire(now, 500);

    // THEN: Both overdue calls are gone, the waiting caller saw a timeout
    assert_eq!(expired, 2);
    assert_eq!(pending.len(), 1);
    match expired_rx.try_recv().expect("reply sent") {
        Err(GatewayError::Timeout {
            method, timeout_ms, ..
        }) => {
            assert_eq!(method, "hang");
            assert_eq!(timeout_ms, 500);
        }
        other => panic!("Expected timeout, got {other:?}"),
    }
    assert!(!pending.resolve(ResponseFrame::success("1", json!({}))));
}

#[test]
fn given_calls_with_deadlines_when_next_deadline_then_earliest_returned() {
    let mut pending = PendingCalls::default();
    assert_eq!(pending.next_deadline(), None);

    let soon = Instant::now() + Duration::from_millis(10);
    let (tx_a, _rx_a) = oneshot::channel();
    pending.insert("a".to_string(), "health".to_string(), tx_a, later());
    let (tx_b, _rx_b) = oneshot::channel();
    pending.insert("b".to_string(), "health".to_string(), tx_b, soon);

    assert_eq!(pending.next_deadline(), Some(soon));
}

/// **VALUE**: Closing rejects every pending call and leaves the map empty.
///
/// **BUG THIS CATCHES**: Callers hanging forever after a disconnect.
#[test]
fn given_several_calls_when_reject_all_then_each_gets_connection_closed() {
    // GIVEN
    let mut pending = PendingCalls::default();
    let mut receivers = Vec::new();
    for id in ["1", "2", "3"] {
        let (tx, rx) = oneshot::channel();
        pending.insert(id.to_string(), "health".to_string(), tx, later());
        receivers.push(rx);
    }

    // WHEN
    let rejected = pending.reject_all();

    // THEN
    assert_eq!(rejected, 3);
    assert_eq!(pending.len(), 0);
    for mut rx in receivers {
        assert!(matches!(
            rx.try_recv().expect("reply sent"),
            Err(GatewayError::ConnectionClosed { .. })
        ));
    }
}
