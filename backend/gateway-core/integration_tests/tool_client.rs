use gateway_core::ToolClient;
use gateway_core::error::ToolError;

use models::ToolInvocation;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Public API tests for the one-shot tool client against a wiremock server
// ============================================================================

async fn client(server: &MockServer) -> ToolClient {
    ToolClient::new(&server.uri(), Some("secret")).expect("tool client")
}

/// **VALUE**: A successful invocation returns `result` untouched and sends
/// the bearer token and the invocation envelope.
///
/// **BUG THIS CATCHES**: Missing Authorization header, or reshaping the
/// result before returning it.
#[tokio::test]
async fn given_ok_reply_when_invoke_then_returns_result_as_is() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"tool": "cron", "action": "list"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"jobs": [{"id": "j1"}], "nested": {"keep": [1, 2]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // WHEN
    let result = client(&server)
        .await
        .invoke(&ToolInvocation::new("cron").with_action("list"))
        .await
        .expect("invoke");

    // THEN
    assert_eq!(
        result,
        json!({"jobs": [{"id": "j1"}], "nested": {"keep": [1, 2]}})
    );
}

#[tokio::test]
async fn given_ok_reply_without_result_when_invoke_then_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let result = client(&server)
        .await
        .invoke(&ToolInvocation::new("write"))
        .await
        .expect("invoke");

    assert!(result.is_null());
}

/// **VALUE**: `ok: false` surfaces the server's message, or a generic one.
///
/// **BUG THIS CATCHES**: Treating any HTTP 200 as success.
#[tokio::test]
async fn given_not_ok_reply_when_invoke_then_failed_with_server_message() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"tool": "read"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error": {"type": "io", "message": "file missing"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"tool": "write"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false})))
        .mount(&server)
        .await;
    let tools = client(&server).await;

    // WHEN
    let with_message = tools.read_file("notes.md").await.expect_err("must fail");
    let without_message = tools.write_file("notes.md", "x").await.expect_err("must fail");

    // THEN
    match with_message {
        ToolError::Failed { tool, message, .. } => {
            assert_eq!(tool, "read");
            assert_eq!(message, "file missing");
        }
        other => panic!("Expected Failed, got {other:?}"),
    }
    assert!(without_message.to_string().contains("tool invocation failed"));
}

#[tokio::test]
async fn given_401_when_invoke_then_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let error = client(&server)
        .await
        .invoke(&ToolInvocation::new("memory_search"))
        .await
        .expect_err("must fail");

    assert!(matches!(error, ToolError::Unauthorized { .. }), "{error:?}");
}

/// **VALUE**: A 404 names the tool that was not found or not allowed.
///
/// **BUG THIS CATCHES**: A generic "HTTP 404" that leaves the caller guessing
/// which tool the gateway refused.
#[tokio::test]
async fn given_404_when_invoke_then_not_found_naming_tool() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = client(&server)
        .await
        .invoke(&ToolInvocation::new("shell_exec"))
        .await
        .expect_err("must fail");

    match &error {
        ToolError::NotFound { tool, .. } => assert_eq!(tool, "shell_exec"),
        other => panic!("Expected NotFound, got {other:?}"),
    }
    assert!(error.to_string().contains("shell_exec"));
}

/// **VALUE**: A 429 with `Retry-After: 7` produces an error whose message
/// contains 7.
///
/// **WHY THIS MATTERS**: The hint is the only guidance the gateway gives on
/// when to try again.
///
/// **BUG THIS CATCHES**: Header dropped, or read from the wrong name.
#[tokio::test]
async fn given_429_with_retry_after_when_invoke_then_message_contains_hint() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    // WHEN
    let error = client(&server)
        .await
        .memory_search("deploy notes", Some(5))
        .await
        .expect_err("must fail");

    // THEN
    match &error {
        ToolError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after.as_deref(), Some("7"))
        }
        other => panic!("Expected RateLimited, got {other:?}"),
    }
    assert!(error.to_string().contains('7'));
}

#[tokio::test]
async fn given_429_without_retry_after_when_invoke_then_unknown_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let error = client(&server)
        .await
        .invoke(&ToolInvocation::new("read"))
        .await
        .expect_err("must fail");

    assert!(error.to_string().contains("unknown"));
}

#[tokio::test]
async fn given_500_when_invoke_then_http_error_with_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let error = client(&server)
        .await
        .invoke(&ToolInvocation::new("read"))
        .await
        .expect_err("must fail");

    assert_eq!(error.status_code(), Some(500));
    assert_eq!(error.error_category(), "server_error");
    assert!(error.to_string().contains("boom"));
}

#[tokio::test]
async fn given_memory_calls_when_invoked_then_args_shaped() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "tool": "memory_search",
            "args": {"query": "release", "maxResults": 3}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "tool": "memory_get",
            "args": {"path": "memory/2026-10-01.md", "from": 10, "lines": 20}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"text": "x"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let tools = client(&server).await;

    // WHEN / THEN
    assert_eq!(
        tools.memory_search("release", Some(3)).await.expect("search"),
        json!([])
    );
    assert_eq!(
        tools
            .memory_get("memory/2026-10-01.md", Some(10), Some(20))
            .await
            .expect("get"),
        json!({"text": "x"})
    );
}

#[tokio::test]
async fn given_resource_path_when_fetch_resource_then_raw_text_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/kanban.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"tasks": []}"#))
        .mount(&server)
        .await;

    let text = client(&server)
        .await
        .fetch_resource("/data/kanban.json")
        .await
        .expect("fetch");

    assert_eq!(text, r#"{"tasks": []}"#);
}

// ----------------------------------------------------------------------------
// ping()
// ----------------------------------------------------------------------------

#[tokio::test]
async fn given_healthy_gateway_when_ping_then_true() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client(&server).await.ping().await);
}

/// **VALUE**: `ping` reports failure as `false`, never as an error.
///
/// **BUG THIS CATCHES**: Liveness checks that throw, forcing every caller to
/// wrap them.
#[tokio::test]
async fn given_unhealthy_or_unreachable_gateway_when_ping_then_false() {
    // GIVEN: unhealthy
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    assert!(!client(&server).await.ping().await);

    // GIVEN: unreachable
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let unreachable =
        ToolClient::new(&format!("http://127.0.0.1:{port}"), None).expect("tool client");

    assert!(!unreachable.ping().await);
}

#[tokio::test]
async fn given_default_base_url_when_client_built_then_trailing_slash_normalized() {
    let tools = ToolClient::new(gateway_core::GATEWAY_BASE_URL, None).expect("tool client");

    assert_eq!(tools.base_url().as_str(), "http://127.0.0.1:18789/");
}
