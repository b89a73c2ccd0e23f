use crate::HttpStatusCode;

#[test]
fn given_rate_limit_status_when_categorized_then_is_retryable_client_error() {
    let status = HttpStatusCode::TOO_MANY_REQUESTS;

    assert!(status.is_client_error());
    assert!(status.is_retryable());
    assert!(!status.is_server_error());
}

#[test]
fn given_auth_and_missing_statuses_when_categorized_then_not_retryable() {
    assert!(!HttpStatusCode::UNAUTHORIZED.is_retryable());
    assert!(!HttpStatusCode::NOT_FOUND.is_retryable());
    assert!(HttpStatusCode::from(503).is_retryable());
    assert!(HttpStatusCode(204).is_success());
    assert_eq!(HttpStatusCode(500).to_string(), "500");
}
