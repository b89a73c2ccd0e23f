use crate::{ConnectParamsBuilder, ModelError, PROTOCOL_VERSION};

use serde_json::json;

/// **VALUE**: Verifies the default handshake shape the gateway expects.
///
/// **WHY THIS MATTERS**: A handshake with the wrong role or a missing client identity is
/// rejected and the client sits in a reconnect loop forever.
///
/// **BUG THIS CATCHES**: Would catch changing the default role or protocol version, or
/// serializing `auth: null` when no token is configured.
#[test]
fn given_client_identity_only_when_building_then_uses_defaults_and_omits_auth() {
    // GIVEN: Only the client identity
    let builder = ConnectParamsBuilder::default().with_client("dashboard", "0.1.0");

    // WHEN: Building and serializing
    let params = builder.build().expect("valid params");
    let value = serde_json::to_value(&params).expect("params serialize");

    // THEN: Default protocol and control role, no auth key
    assert_eq!(
        value,
        json!({
            "protocol": PROTOCOL_VERSION,
            "client": {"name": "dashboard", "version": "0.1.0"},
            "role": "control"
        })
    );
}

#[test]
fn given_token_when_building_then_includes_auth_and_redacts_debug() {
    let params = ConnectParamsBuilder::default()
        .with_client("dashboard", "0.1.0")
        .with_token(Some("tok-123"))
        .build()
        .expect("valid params");

    let auth = params.auth.as_ref().expect("auth present");
    assert_eq!(auth.token, "tok-123");
    assert!(!format!("{params:?}").contains("tok-123"));
}

#[test]
fn given_empty_token_when_building_then_auth_is_absent() {
    let params = ConnectParamsBuilder::default()
        .with_client("dashboard", "0.1.0")
        .with_token(Some(""))
        .build()
        .expect("valid params");

    assert!(params.auth.is_none());
}

#[test]
fn given_missing_client_when_building_then_returns_validation_error() {
    let result = ConnectParamsBuilder::default().build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Client name is required");
        }
        Ok(params) => panic!("Expected validation error, got {params:?}"),
    }
}

#[test]
fn given_zero_protocol_when_building_then_returns_validation_error() {
    let result = ConnectParamsBuilder::default()
        .with_protocol(0)
        .with_client("dashboard", "0.1.0")
        .build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Protocol version must be non-zero");
        }
        Ok(params) => panic!("Expected validation error, got {params:?}"),
    }
}
