use crate::sync::live::{parse_presence, upsert_execution, upsert_heartbeat};

use models::{ExecutionRun, HeartbeatSample};

use serde_json::json;

fn sample(agent_id: &str, latency_ms: f64) -> HeartbeatSample {
    HeartbeatSample {
        agent_id: agent_id.to_string(),
        latency_ms: Some(latency_ms),
        ..HeartbeatSample::default()
    }
}

fn run(run_id: &str, status: &str) -> ExecutionRun {
    ExecutionRun {
        run_id: run_id.to_string(),
        status: Some(status.to_string()),
        ..ExecutionRun::default()
    }
}

/// **VALUE**: Two ticks for the same agent leave exactly one entry holding
/// the second value.
///
/// **BUG THIS CATCHES**: Appending instead of upserting, which grows the
/// heartbeat list without bound and shows stale latency.
#[test]
fn given_two_ticks_same_agent_when_upserted_then_single_entry_with_latest_value() {
    // GIVEN
    let mut buffer = Vec::new();

    // WHEN
    upsert_heartbeat(&mut buffer, sample("a1", 12.0), 50);
    upsert_heartbeat(&mut buffer, sample("a1", 48.5), 50);

    // THEN
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer[0].agent_id, "a1");
    assert_eq!(buffer[0].latency_ms, Some(48.5));
}

#[test]
fn given_existing_heartbeats_when_new_agent_ticks_then_prepended() {
    let mut buffer = vec![sample("a1", 1.0)];

    upsert_heartbeat(&mut buffer, sample("a2", 2.0), 50);

    assert_eq!(buffer[0].agent_id, "a2");
    assert_eq!(buffer[1].agent_id, "a1");
}

#[test]
fn given_full_buffer_when_upserting_then_oldest_dropped_at_cap() {
    let mut buffer = Vec::new();
    for i in 0..5 {
        upsert_heartbeat(&mut buffer, sample(&format!("a{i}"), 1.0), 3);
    }

    let ids: Vec<&str> = buffer.iter().map(|s| s.agent_id.as_str()).collect();
    assert_eq!(ids, vec!["a4", "a3", "a2"]);
}

/// **VALUE**: A known run id is replaced in place; a new one is prepended.
///
/// **BUG THIS CATCHES**: Status updates for a running execution reordering
/// the list or duplicating the run.
#[test]
fn given_known_run_when_upserted_then_replaced_in_place() {
    // GIVEN
    let mut buffer = vec![run("r2", "running"), run("r1", "done")];

    // WHEN
    upsert_execution(&mut buffer, run("r1", "failed"), 50);
    upsert_execution(&mut buffer, run("r3", "queued"), 50);

    // THEN
    let view: Vec<(&str, &str)> = buffer
        .iter()
        .map(|r| (r.run_id.as_str(), r.status.as_deref().unwrap_or("")))
        .collect();
    assert_eq!(
        view,
        vec![("r3", "queued"), ("r2", "running"), ("r1", "failed")]
    );
}

#[test]
fn given_presence_map_when_parsed_then_ids_default_to_keys() {
    // GIVEN
    let payload = json!({
        "alpha": {"status": "online"},
        "beta": {"id": "beta-explicit", "status": "idle"},
        "junk": 42
    });

    // WHEN
    let agents = parse_presence(&payload).expect("object payload");

    // THEN
    let mut ids: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["alpha", "beta-explicit"]);
}

#[test]
fn given_non_object_presence_when_parsed_then_none() {
    assert!(parse_presence(&json!([1, 2, 3])).is_none());
}
