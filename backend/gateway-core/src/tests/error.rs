use crate::error::{GatewayError, ToolError};
use crate::sync::Priority;

/// **VALUE**: The rate-limit message names the Retry-After hint.
///
/// **BUG THIS CATCHES**: Dropping the header value, leaving callers no way to
/// back off correctly.
#[test]
fn given_retry_after_when_rate_limited_then_message_contains_value() {
    let error = ToolError::rate_limited("memory_search", Some("7".to_string()));

    let message = error.to_string();

    assert!(message.contains('7'), "Got: {message}");
    assert!(message.contains("memory_search"));
    assert!(error.is_retryable());
    assert_eq!(error.status_code(), Some(429));
}

#[test]
fn given_no_retry_after_when_rate_limited_then_message_says_unknown() {
    let error = ToolError::rate_limited("read", None);

    assert!(error.to_string().contains("unknown"));
}

#[test]
fn given_tool_errors_when_categorized_then_status_driven() {
    assert_eq!(ToolError::unauthorized("x").error_category(), "unauthorized");
    assert_eq!(ToolError::not_found("x").error_category(), "not_found");
    assert_eq!(ToolError::http("x", 503, "").error_category(), "server_error");
    assert_eq!(ToolError::http("x", 400, "").error_category(), "client_error");
    assert!(ToolError::http("x", 503, "").is_retryable());
    assert!(!ToolError::unauthorized("x").is_retryable());
    assert!(!ToolError::failed("x", "boom").is_retryable());
}

/// **VALUE**: Timeout and protocol failures read differently.
///
/// **BUG THIS CATCHES**: Callers unable to tell "server said no" from "server
/// never answered".
#[test]
fn given_timeout_and_protocol_errors_when_displayed_then_distinct() {
    let timeout = GatewayError::timeout("health", 15_000).to_string();
    let protocol = GatewayError::protocol("health", "E", "bad params").to_string();

    assert!(timeout.contains("15000ms"));
    assert!(protocol.contains("bad params"));
    assert_ne!(
        GatewayError::timeout("health", 1).error_category(),
        GatewayError::protocol("health", "E", "m").error_category()
    );
}

#[test]
fn given_empty_server_message_when_protocol_error_then_generic_fallback() {
    let error = GatewayError::protocol("agent", "", "");

    assert!(error.to_string().contains("request failed"));
}

#[test]
fn given_priorities_when_applied_then_prefix_only_for_high_and_low() {
    assert_eq!(Priority::High.apply("deploy"), "[URGENT] deploy");
    assert_eq!(Priority::Low.apply("deploy"), "[LOW] deploy");
    assert_eq!(Priority::Normal.apply("deploy"), "deploy");
    assert_eq!(Priority::default(), Priority::Normal);
}
