use crate::{CronJob, HeartbeatSample, Keyed, NewCronJob};

use serde_json::json;

#[test]
fn given_job_with_unknown_fields_when_round_tripped_then_keeps_them() {
    let raw = json!({
        "id": "j1",
        "name": "backup",
        "schedule": "0 3 * * *",
        "owner": "ops"
    });

    let job: CronJob = serde_json::from_value(raw).expect("valid job");
    let back = serde_json::to_value(&job).expect("job serializes");

    assert!(job.enabled, "enabled defaults to true");
    assert_eq!(job.extra.get("owner"), Some(&json!("ops")));
    assert_eq!(back["owner"], json!("ops"));
    assert_eq!(job.key(), "j1");
}

#[test]
fn given_partial_job_when_converted_then_assigns_id_and_defaults() {
    let partial = NewCronJob {
        name: "digest".to_string(),
        schedule: "@daily".to_string(),
        enabled: None,
        command: Some("send-digest".to_string()),
    };

    let job = partial.into_job("job-1");

    assert_eq!(job.id, "job-1");
    assert_eq!(job.name, "digest");
    assert!(job.enabled);
    assert_eq!(job.command.as_deref(), Some("send-digest"));
}

#[test]
fn given_tick_payload_when_deserialized_then_keys_by_agent() {
    let sample: HeartbeatSample =
        serde_json::from_value(json!({"agentId": "a1", "latencyMs": 42.5}))
            .expect("valid sample");

    assert_eq!(sample.key(), "a1");
    assert_eq!(sample.latency_ms, Some(42.5));
}
