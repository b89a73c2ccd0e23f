//! Startup and shutdown of the composition root against a gateway that is
//! not listening.

use dashboard::app::{AppPaths, Dashboard};
use dashboard::error::DashboardError;

use gateway_core::gateway::ConnectionState;
use gateway_core::sync::{Domain, Tier};
use gateway_core::{BuiltinData, GatewayConfig, RpcTuning, SyncSettings};

use std::time::Duration;

use tokio::net::TcpListener;

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

fn fast_tuning() -> RpcTuning {
    RpcTuning {
        request_timeout: Duration::from_millis(300),
        backoff_initial: Duration::from_millis(20),
        backoff_max: Duration::from_millis(100),
    }
}

/// **VALUE**: Config and builtin seed are read from the config directory.
///
/// **WHY THIS MATTERS**: With no gateway reachable the builtin seed is all the
/// user sees. If it is not loaded the dashboard starts empty.
///
/// **BUG THIS CATCHES**: Would catch `build` ignoring `builtin.json` or the
/// port from `gateway.json`.
#[tokio::test]
async fn given_config_and_builtin_files_when_build_then_builtin_served() {
    // GIVEN: gateway.json with a dead port and a builtin seed with one job
    let temp = tempfile::tempdir().expect("temp dir");
    let paths = AppPaths::under(temp.path());
    paths.ensure().expect("ensure");
    let port = closed_port().await;
    std::fs::write(
        paths.config_dir.join("gateway.json"),
        format!(r#"{{"host":"127.0.0.1","port":{port}}}"#),
    )
    .expect("write config");
    std::fs::write(
        paths.builtin_path(),
        r#"{"cronJobs":[{"id":"seed-1","name":"Nightly","schedule":"0 2 * * *"}]}"#,
    )
    .expect("write builtin");

    // WHEN: Building
    let dashboard = Dashboard::build(&paths).expect("Failed to build dashboard");

    // THEN: The seed job is visible from the builtin tier
    let sync = dashboard.sync();
    assert_eq!(sync.active_tier(Domain::CronJobs), Tier::Builtin);
    let jobs = sync.cron_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "seed-1");
    assert_eq!(sync.gateway().state(), ConnectionState::Disconnected);
}

/// **VALUE**: A malformed seed file stops startup with a readable error.
///
/// **BUG THIS CATCHES**: Would catch a parse failure being swallowed into an
/// empty builtin tier.
#[tokio::test]
async fn given_malformed_builtin_when_build_then_core_error() {
    // GIVEN: A builtin.json that is not JSON
    let temp = tempfile::tempdir().expect("temp dir");
    let paths = AppPaths::under(temp.path());
    paths.ensure().expect("ensure");
    std::fs::write(paths.builtin_path(), "not json").expect("write builtin");

    // WHEN: Building
    let result = Dashboard::build(&paths);

    // THEN: Core error mentioning the builtin data
    match result {
        Err(DashboardError::Core { message, .. }) => {
            assert!(message.contains("builtin"), "got: {message}");
        }
        Err(other) => panic!("Expected Core error, got {other:?}"),
        Ok(_) => panic!("Expected build to fail"),
    }
}

/// **VALUE**: `run_until` returns once shutdown resolves and leaves the client
/// disconnected with nothing pending, even while reconnect attempts are
/// failing.
///
/// **BUG THIS CATCHES**: Would catch a shutdown that leaves the reconnect timer
/// armed or the sync supervisor running.
#[tokio::test]
async fn given_unreachable_gateway_when_run_until_shutdown_then_disconnected() {
    // GIVEN: A dashboard pointed at a dead port
    let config = GatewayConfig::new("127.0.0.1", closed_port().await);
    let dashboard = Dashboard::from_parts(
        &config,
        BuiltinData::default(),
        fast_tuning(),
        SyncSettings {
            poll_interval: Duration::from_millis(50),
            ..SyncSettings::default()
        },
    )
    .expect("Failed to build dashboard");

    // WHEN: Running for a short while
    tokio::time::timeout(
        Duration::from_secs(5),
        dashboard.run_until(
            tokio::time::sleep(Duration::from_millis(300)),
            Duration::from_millis(50),
        ),
    )
    .await
    .expect("run_until did not return");

    // THEN: Disconnected, no calls pending, reads still served
    let gateway = dashboard.sync().gateway();
    assert_eq!(gateway.state(), ConnectionState::Disconnected);
    assert_eq!(gateway.pending_calls().await, 0);
    assert!(dashboard.sync().agents().is_empty());
}
