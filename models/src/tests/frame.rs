use crate::{ErrorShape, Frame, RequestFrame, ResponseFrame};

use serde_json::json;

/// **VALUE**: Verifies that requests serialize with the `req` discriminator and omit absent params.
///
/// **WHY THIS MATTERS**: The gateway dispatches on `type`. A wrong tag or a `"params": null`
/// where the server expects an object makes every call fail.
///
/// **BUG THIS CATCHES**: Would catch changing the serde tag/rename attributes on `Frame`.
#[test]
fn given_request_without_params_when_serialized_then_emits_req_frame() {
    // GIVEN: A request with no params
    let frame = Frame::Request(RequestFrame::new("7", "health", None));

    // WHEN: Serializing
    let value = serde_json::to_value(&frame).expect("request serializes");

    // THEN: Tagged as req, params omitted
    assert_eq!(value, json!({"type": "req", "id": "7", "method": "health"}));
}

#[test]
fn given_failed_response_text_when_parsed_then_carries_error_shape() {
    let text = r#"{"type":"res","id":"3","ok":false,"error":{"code":"FORBIDDEN","message":"nope"}}"#;

    let frame = Frame::parse(text).expect("valid frame");

    match frame {
        Frame::Response(ResponseFrame {
            id, ok, payload, error,
        }) => {
            assert_eq!(id, "3");
            assert!(!ok);
            assert!(payload.is_none());
            assert_eq!(
                error,
                Some(ErrorShape {
                    code: "FORBIDDEN".to_string(),
                    message: "nope".to_string(),
                })
            );
        }
        other => panic!("Expected response frame, got {other:?}"),
    }
}

/// **VALUE**: Verifies that event frames accept both the `event` field and the `name` alias,
/// plus the optional sequence and state version.
///
/// **BUG THIS CATCHES**: Would catch dropping the alias, which silently turns every event
/// from an older gateway into an unparsable (and therefore dropped) frame.
#[test]
fn given_event_text_with_name_alias_when_parsed_then_reads_name_and_sequence() {
    let text = r#"{"type":"event","name":"tick","payload":{"agentId":"a1"},"seq":9,"stateVersion":{"presence":2}}"#;

    let frame = Frame::parse(text).expect("valid frame");

    match frame {
        Frame::Event(event) => {
            assert_eq!(event.name, "tick");
            assert_eq!(event.payload, json!({"agentId": "a1"}));
            assert_eq!(event.seq, Some(9));
            assert_eq!(event.state_version, Some(json!({"presence": 2})));
        }
        other => panic!("Expected event frame, got {other:?}"),
    }
}

#[test]
fn given_malformed_or_untagged_text_when_parsed_then_returns_none() {
    assert!(Frame::parse("not json").is_none());
    assert!(Frame::parse(r#"{"id":"1","ok":true}"#).is_none());
    assert!(Frame::parse(r#"{"type":"bogus","id":"1"}"#).is_none());
}
