use crate::helpers::{
    MockGateway, client_for, connected_client, event_text, fast_tuning, scripted_gateway,
    wait_for_state, wait_until,
};

use gateway_core::error::{GatewayError, SyncError};
use gateway_core::gateway::{ConnectionState, GatewayClient};
use gateway_core::sync::{BuiltinData, DashboardSync, Domain, Priority, SyncSettings, Tier};
use gateway_core::{GatewayConfig, ToolClient};

use models::{CronJob, NewCronJob};

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Public API tests for the reconciliation layer: a mock gateway for the live
// side, wiremock for the tool endpoint and fallback resources.
// ============================================================================

const CRON_PATH: &str = "/data/cron-jobs.json";
const KANBAN_PATH: &str = "/data/kanban.json";

fn fast_settings() -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_millis(50),
        ..SyncSettings::default()
    }
}

fn builtin_jobs() -> BuiltinData {
    BuiltinData::from_json_str(
        r#"{"cronJobs":[
            {"id":"builtin-1","name":"Nightly backup","schedule":"0 3 * * *"},
            {"id":"builtin-2","name":"Digest","schedule":"0 8 * * 1"}
        ]}"#,
    )
    .expect("builtin data")
}

fn jobs_text(ids: &[&str]) -> String {
    let jobs: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "name": format!("Job {id}"), "schedule": "* * * * *"}))
        .collect();
    json!({ "jobs": jobs }).to_string()
}

async fn serve_text(server: &MockServer, resource: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(resource))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn sync_for(gateway: GatewayClient, server: &MockServer, builtin: BuiltinData) -> DashboardSync {
    let tools = ToolClient::new(&server.uri(), None).expect("tool client");
    DashboardSync::new(gateway, tools, builtin, fast_settings())
}

fn job_ids(jobs: &[CronJob]) -> Vec<String> {
    jobs.iter().map(|j| j.id.clone()).collect()
}

async fn fallback_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count()
}

// ----------------------------------------------------------------------------
// Tier precedence and polling
// ----------------------------------------------------------------------------

/// **VALUE**: With no data anywhere but builtin, reads come from builtin.
///
/// **BUG THIS CATCHES**: Consumers getting an empty list while a seed exists.
#[tokio::test]
async fn given_only_builtin_when_read_then_builtin_tier_active() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 404, "").await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());

    // WHEN
    let jobs = sync.cron_jobs();

    // THEN
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Builtin);
    assert_eq!(job_ids(&jobs), vec!["builtin-1", "builtin-2"]);
    assert_eq!(sync.cron_job("builtin-2").map(|j| j.name), Some("Digest".into()));
}

/// **VALUE**: While disconnected the fallback poll fills the polled tier,
/// which then wins over builtin.
///
/// **BUG THIS CATCHES**: Poll loop never started when the client was never
/// connected, or polled data ignored by the read path.
#[tokio::test]
async fn given_disconnected_when_fallback_serves_jobs_then_polled_tier_active() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["p1", "p2", "p3"])).await;
    serve_text(&server, KANBAN_PATH, 200, r#"{"tasks":[{"id":"t1","title":"Ship"}]}"#).await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());

    // WHEN
    sync.start();
    wait_until("polled data applied", || sync.stats().polls_applied >= 2).await;

    // THEN
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Polled);
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["p1", "p2", "p3"]);
    assert_eq!(sync.kanban_tasks().len(), 1);
    assert_eq!(sync.kanban_task("t1").map(|t| t.title), Some("Ship".into()));

    sync.shutdown().await;
}

/// **VALUE**: Identical poll text is parsed and applied at most once.
///
/// **BUG THIS CATCHES**: Re-applying every 5s, which would also wipe local
/// edits on every tick.
#[tokio::test]
async fn given_identical_poll_text_when_polled_repeatedly_then_applied_once() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["p1"])).await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let sync = sync_for(client_for(&mock), &server, BuiltinData::default());

    // WHEN
    sync.start();
    wait_until("several unchanged polls", || sync.stats().polls_unchanged >= 3).await;

    // THEN
    assert_eq!(sync.stats().polls_applied, 1);
    sync.shutdown().await;
}

/// **VALUE**: Broken fallback responses leave the previous data in place and
/// never surface as errors.
///
/// **BUG THIS CATCHES**: An HTML error page or a 500 clearing the polled tier.
#[tokio::test]
async fn given_failing_or_invalid_fallback_when_polled_then_previous_data_kept() {
    // GIVEN: first a good payload
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["good"])).await;
    serve_text(&server, KANBAN_PATH, 500, "").await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());
    sync.start();
    wait_until("good payload applied", || sync.stats().polls_applied >= 1).await;

    // WHEN: the resource starts returning garbage
    server.reset().await;
    serve_text(&server, CRON_PATH, 200, "<html>upstream error</html>").await;
    serve_text(&server, KANBAN_PATH, 500, "").await;
    let failures_before = sync.stats().poll_failures;
    wait_until("failures counted", || {
        sync.stats().poll_failures >= failures_before + 4
    })
    .await;

    // THEN
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["good"]);
    assert_eq!(sync.active_tier(Domain::KanbanTasks), Tier::Builtin);
    sync.shutdown().await;
}

// ----------------------------------------------------------------------------
// Local mutations
// ----------------------------------------------------------------------------

/// **VALUE**: A created job is visible on the very next read, seeded on top
/// of builtin when nothing was polled yet.
///
/// **BUG THIS CATCHES**: Creating into an empty polled tier, which would make
/// every builtin job disappear the moment one job is added.
#[tokio::test]
async fn given_empty_polled_when_create_job_then_builtin_seeded_and_job_visible() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());

    // WHEN
    let created = sync.create_job(NewCronJob {
        name: "Rotate logs".to_string(),
        schedule: "0 0 * * *".to_string(),
        ..NewCronJob::default()
    });

    // THEN
    assert!(created.id.starts_with("job-"));
    assert!(created.enabled);
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Polled);
    assert_eq!(
        job_ids(&sync.cron_jobs()),
        vec!["builtin-1".to_string(), "builtin-2".to_string(), created.id.clone()]
    );
}

#[tokio::test]
async fn given_seeded_jobs_when_update_and_delete_then_applied_locally() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());
    let mut job = sync.cron_job("builtin-1").expect("builtin job");
    job.enabled = false;

    // WHEN
    let updated = sync.update_job(job);
    let deleted = sync.delete_job("builtin-2");
    let missing = sync.delete_job("nope");

    // THEN
    assert!(updated && deleted && !missing);
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["builtin-1"]);
    assert!(!sync.cron_job("builtin-1").expect("still there").enabled);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

/// **VALUE**: Editing or deleting an id that does not exist leaves every
/// tier untouched, including which tier is active.
///
/// **BUG THIS CATCHES**: Seeding the polled tier from builtin before looking
/// for the id, so a no-op edit flips reads from builtin to polled.
#[tokio::test]
async fn given_builtin_only_when_update_or_delete_unknown_id_then_tier_unchanged() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let sync = sync_for(client_for(&mock), &server, builtin_jobs());
    let stranger = CronJob {
        id: "not-a-job".to_string(),
        ..CronJob::default()
    };

    // WHEN
    let updated = sync.update_job(stranger);
    let deleted = sync.delete_job("not-a-job");

    // THEN
    assert!(!updated && !deleted);
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Builtin);
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["builtin-1", "builtin-2"]);
}

/// **VALUE**: A local edit survives polls that return unchanged text and is
/// superseded by a poll with new text.
///
/// **WHY THIS MATTERS**: This is the documented conflict behavior: local
/// edits are provisional until the source of truth changes.
///
/// **BUG THIS CATCHES**: Unchanged polls clobbering edits (dedup broken), or
/// new text merged instead of replacing the tier.
#[tokio::test]
async fn given_local_edit_when_polls_arrive_then_kept_until_text_changes() {
    // GIVEN: polled tier holds p1
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["p1"])).await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let sync = sync_for(client_for(&mock), &server, BuiltinData::default());
    sync.start();
    wait_until("first poll applied", || sync.stats().polls_applied >= 1).await;

    // WHEN: local create, then unchanged polls
    let created = sync.create_job(NewCronJob {
        name: "Local".to_string(),
        ..NewCronJob::default()
    });
    let unchanged = sync.stats().polls_unchanged;
    wait_until("unchanged polls", || sync.stats().polls_unchanged >= unchanged + 2).await;

    // THEN: edit survives
    assert!(sync.cron_job(&created.id).is_some());

    // WHEN: fallback text changes
    server.reset().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["p1", "p2"])).await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    wait_until("new text applied", || sync.stats().polls_applied >= 2).await;

    // THEN: polled tier replaced wholesale
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["p1", "p2"]);
    sync.shutdown().await;
}

// ----------------------------------------------------------------------------
// Connection-driven behavior
// ----------------------------------------------------------------------------

/// **VALUE**: On connect, cron jobs and kanban tasks come from the immediate
/// tool fetch, not from the duplex `cron.list` call.
///
/// **BUG THIS CATCHES**: Waiting for the next poll tick after connecting, or
/// leaving polled data stale for the whole connected session.
#[tokio::test]
async fn given_gateway_connects_when_started_then_tool_fetch_fills_jobs_and_tasks() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(body_partial_json(json!({"tool": "cron", "action": "list"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"jobs": [{"id": "c1"}, {"id": "c2"}, {"id": "c3"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tools/invoke"))
        .and(body_partial_json(json!({"tool": "read", "args": {"path": "data/kanban.json"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"content": "{\"tasks\":[{\"id\":\"k1\",\"title\":\"Triage\"}]}"}
        })))
        .mount(&server)
        .await;
    serve_text(&server, CRON_PATH, 404, "").await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let gateway = client_for(&mock);
    let sync = sync_for(gateway.clone(), &server, builtin_jobs());

    // WHEN
    sync.start();
    gateway.connect();
    wait_for_state(&gateway, ConnectionState::Connected).await;
    wait_until("tool fetches applied", || sync.stats().tool_fetches_applied >= 2).await;

    // THEN
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["c1", "c2", "c3"]);
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Polled);
    assert_eq!(sync.kanban_task("k1").map(|t| t.title), Some("Triage".into()));
    assert!(mock.requests_for("cron.list").is_empty());

    sync.shutdown().await;
    gateway.disconnect().await;
}

/// **VALUE**: The fallback poll stops once connected, and a failed tool
/// fetch is swallowed.
///
/// **BUG THIS CATCHES**: Orphaned poll timers hitting the fallback resources
/// for the whole connected session.
#[tokio::test]
async fn given_polling_when_gateway_connects_then_poll_stops_and_failure_swallowed() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 200, &jobs_text(&["p1"])).await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let gateway = client_for(&mock);
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());
    sync.start();
    wait_until("polling", || sync.stats().polls_applied >= 1).await;

    // WHEN
    gateway.connect();
    wait_for_state(&gateway, ConnectionState::Connected).await;
    wait_until("tool fetch failures", || sync.stats().tool_fetch_failures >= 2).await;
    let polls_after_connect = fallback_requests(&server).await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    // THEN
    assert_eq!(fallback_requests(&server).await, polls_after_connect);
    assert_eq!(job_ids(&sync.cron_jobs()), vec!["p1"]);

    sync.shutdown().await;
    gateway.disconnect().await;
}

#[tokio::test]
async fn given_started_sync_when_shutdown_then_no_more_polls() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 404, "").await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let sync = sync_for(client_for(&mock), &server, BuiltinData::default());
    sync.start();
    wait_until("polling", || sync.stats().poll_failures >= 2).await;

    // WHEN
    sync.shutdown().await;
    let after_shutdown = fallback_requests(&server).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // THEN
    assert_eq!(fallback_requests(&server).await, after_shutdown);
}

// ----------------------------------------------------------------------------
// Live ingestion
// ----------------------------------------------------------------------------

/// **VALUE**: Two ticks for `a1` leave exactly one heartbeat holding the
/// second value, served from the live tier while connected.
///
/// **BUG THIS CATCHES**: Appending ticks, or live data not winning over
/// builtin while connected.
#[tokio::test]
async fn given_connected_when_tick_arrives_twice_then_single_latest_heartbeat() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let gateway = connected_client(&mock).await;
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());
    sync.start();

    // WHEN
    mock.push_event("tick", json!({"agentId": "a1", "latencyMs": 12}));
    mock.push_event("tick", json!({"agentId": "a1", "latencyMs": 48}));
    wait_until("two ticks applied", || sync.stats().live_events_applied >= 2).await;

    // THEN
    let heartbeats = sync.heartbeats();
    assert_eq!(heartbeats.len(), 1);
    assert_eq!(heartbeats[0].latency_ms, Some(48.0));
    assert_eq!(sync.active_tier(Domain::Heartbeats), Tier::Live);

    sync.shutdown().await;
    gateway.disconnect().await;
}

/// **VALUE**: Presence is a snapshot; live data stays in memory across a
/// disconnect but is only served while connected.
///
/// **BUG THIS CATCHES**: Merging presence snapshots, or serving stale live
/// agents after the connection is gone.
#[tokio::test]
async fn given_presence_snapshots_when_disconnected_then_tier_falls_back() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    serve_text(&server, CRON_PATH, 404, "").await;
    serve_text(&server, KANBAN_PATH, 404, "").await;
    let gateway = connected_client(&mock).await;
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());
    sync.start();

    // WHEN
    mock.push_event("presence", json!({"a1": {"status": "online"}, "a2": {}}));
    mock.push_event("presence", json!({"a3": {"status": "busy"}}));
    wait_until("two snapshots", || sync.stats().live_events_applied >= 2).await;

    // THEN
    let agents = sync.agents();
    assert_eq!(agents.len(), 1);
    assert_eq!(sync.agent("a3").and_then(|a| a.status), Some("busy".into()));
    assert_eq!(sync.active_tier(Domain::Agents), Tier::Live);

    // WHEN
    gateway.disconnect().await;

    // THEN
    assert_eq!(sync.active_tier(Domain::Agents), Tier::Builtin);
    assert!(sync.agents().is_empty());
    sync.shutdown().await;
}

/// **VALUE**: A snapshot pushed before the handshake reply never becomes
/// the live agents tier.
///
/// **BUG THIS CATCHES**: Live buffers filled while still `Connecting`, then
/// served as live data once the handshake completes.
#[tokio::test]
async fn given_presence_before_handshake_when_connected_then_live_agents_not_populated() {
    // GIVEN: presence ahead of the hello, one tick behind it
    let server = MockServer::start().await;
    let port = scripted_gateway(
        vec![event_text("presence", json!({"ghost": {"status": "online"}}))],
        vec![event_text("tick", json!({"agentId": "a1", "latencyMs": 5}))],
    )
    .await;
    let gateway = GatewayClient::new(&GatewayConfig::new("127.0.0.1", port), fast_tuning())
        .expect("Failed to build client");
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());
    sync.start();

    // WHEN
    gateway.connect();
    wait_for_state(&gateway, ConnectionState::Connected).await;
    wait_until("tick applied", || sync.stats().live_events_applied >= 1).await;

    // THEN: The tick landed, the early presence did not
    assert_eq!(sync.active_tier(Domain::Heartbeats), Tier::Live);
    assert_eq!(sync.stats().live_events_applied, 1);
    assert_eq!(sync.active_tier(Domain::Agents), Tier::Builtin);
    assert!(sync.agent("ghost").is_none());

    sync.shutdown().await;
    gateway.disconnect().await;
}

#[tokio::test]
async fn given_connected_when_agent_events_arrive_then_executions_upserted() {
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let gateway = connected_client(&mock).await;
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());
    sync.start();

    mock.push_event("agent", json!({"runId": "r1", "status": "running"}));
    mock.push_event("agent", json!({"runId": "r2", "status": "running"}));
    mock.push_event("agent", json!({"runId": "r1", "status": "done"}));
    mock.push_event("agent", json!({"status": "no id"}));
    wait_until("events processed", || {
        let stats = sync.stats();
        stats.live_events_applied >= 3 && stats.live_events_ignored >= 1
    })
    .await;

    let runs: Vec<(String, Option<String>)> = sync
        .executions()
        .into_iter()
        .map(|r| (r.run_id, r.status))
        .collect();
    assert_eq!(
        runs,
        vec![
            ("r2".to_string(), Some("running".to_string())),
            ("r1".to_string(), Some("done".to_string())),
        ]
    );

    sync.shutdown().await;
    gateway.disconnect().await;
}

// ----------------------------------------------------------------------------
// dispatch()
// ----------------------------------------------------------------------------

/// **VALUE**: Dispatch while disconnected fails before touching the network.
///
/// **BUG THIS CATCHES**: Messages silently queued or sent through some other
/// channel while the gateway is down.
#[tokio::test]
async fn given_disconnected_when_dispatch_then_not_connected_and_nothing_sent() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let sync = sync_for(client_for(&mock), &server, BuiltinData::default());

    // WHEN
    let result = sync.dispatch("a1", "deploy", Priority::High).await;

    // THEN
    assert!(matches!(
        result,
        Err(SyncError::Gateway(GatewayError::NotConnected { .. }))
    ));
    assert!(mock.requests().is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn given_connected_when_dispatch_with_priority_then_message_prefixed() {
    // GIVEN
    let mock = MockGateway::start().await;
    let server = MockServer::start().await;
    let gateway = connected_client(&mock).await;
    let sync = sync_for(gateway.clone(), &server, BuiltinData::default());

    // WHEN
    sync.dispatch("a1", "deploy", Priority::High).await.expect("high");
    sync.dispatch("a1", "tidy up", Priority::Low).await.expect("low");
    sync.dispatch("a1", "status?", Priority::Normal).await.expect("normal");

    // THEN
    let messages: Vec<Value> = mock
        .requests_for("agent")
        .into_iter()
        .map(|r| r.params.expect("params")["message"].clone())
        .collect();
    assert_eq!(
        messages,
        vec![json!("[URGENT] deploy"), json!("[LOW] tidy up"), json!("status?")]
    );
    assert!(sync.executions().is_empty(), "No optimistic execution record");

    gateway.disconnect().await;
}
