// Unit tests for the composition root: path layout and status line

use crate::app::{AppPaths, BUILTIN_FILE_NAME, Dashboard};

use gateway_core::{BuiltinData, GatewayConfig, RpcTuning, SyncSettings};

/// **VALUE**: A single root holds config and logs in fixed subdirectories.
///
/// **BUG THIS CATCHES**: Would catch the builtin seed being looked up outside
/// the config directory.
#[test]
fn given_root_when_paths_under_then_layout_fixed() {
    // GIVEN: A root
    let root = std::path::Path::new("/srv/dash");

    // WHEN: Building paths under it
    let paths = AppPaths::under(root);

    // THEN: Fixed layout
    assert_eq!(paths.config_dir, root.join("config"));
    assert_eq!(paths.log_dir, root.join("logs"));
    assert_eq!(
        paths.builtin_path(),
        root.join("config").join(BUILTIN_FILE_NAME)
    );
}

/// **VALUE**: `ensure` creates missing directories and is repeatable.
///
/// **BUG THIS CATCHES**: Would catch `create_dir` (non-recursive) or an error on
/// directories that already exist.
#[test]
fn given_missing_dirs_when_ensure_twice_then_both_exist() {
    // GIVEN: Paths below a fresh temp dir
    let temp = tempfile::tempdir().expect("temp dir");
    let paths = AppPaths::under(&temp.path().join("nested"));

    // WHEN: Ensuring twice
    paths.ensure().expect("first ensure");
    paths.ensure().expect("second ensure");

    // THEN: Both directories exist
    assert!(paths.config_dir.is_dir());
    assert!(paths.log_dir.is_dir());
}

/// **VALUE**: The status line reports the state and the tier of every domain.
///
/// **WHY THIS MATTERS**: It is the only periodic signal an operator gets about
/// whether reads are served from live, polled or builtin data.
///
/// **BUG THIS CATCHES**: Would catch a domain missing from the summary or the
/// state being rendered with Debug formatting.
#[tokio::test]
async fn given_unstarted_dashboard_when_status_line_then_all_domains_builtin() {
    // GIVEN: A dashboard that was never started
    let dashboard = Dashboard::from_parts(
        &GatewayConfig::default(),
        BuiltinData::default(),
        RpcTuning::default(),
        SyncSettings::default(),
    )
    .expect("Failed to build dashboard");

    // WHEN: Rendering the status line
    let line = dashboard.status_line();

    // THEN: Disconnected, every domain on the builtin tier
    assert!(line.starts_with("state=disconnected "), "got: {line}");
    for domain in [
        "agents",
        "executions",
        "heartbeats",
        "cron_jobs",
        "kanban_tasks",
    ] {
        assert!(line.contains(&format!("{domain}=builtin")), "got: {line}");
    }
    assert!(line.contains("poll_failures=0"));
}
