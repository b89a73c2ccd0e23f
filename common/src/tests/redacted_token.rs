use crate::RedactedToken;

/// **VALUE**: Verifies the token never appears in Debug or Display output.
///
/// **WHY THIS MATTERS**: The gateway config is logged at startup. A derived Debug
/// would print the bearer credential into the log file.
///
/// **BUG THIS CATCHES**: Would catch replacing the manual impls with `#[derive(Debug)]`.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    let token = RedactedToken::new("super-secret-value");

    let debug = format!("{token:?}");
    let display = format!("{token}");

    assert!(!debug.contains("super-secret-value"));
    assert!(!display.contains("super-secret-value"));
    assert_eq!(token.expose(), "super-secret-value");
    assert_eq!(token.len(), 18);
}

#[test]
fn given_token_when_serialized_then_refuses() {
    let token = RedactedToken::new("abc");

    let result = serde_json::to_string(&token);

    assert!(result.is_err(), "Serialization must be refused");
}

#[test]
fn given_json_string_when_deserialized_then_wraps_value() {
    let token: RedactedToken = serde_json::from_str("\"from-file\"").expect("valid token json");

    assert_eq!(token.expose(), "from-file");
    assert!(!token.is_empty());
}
