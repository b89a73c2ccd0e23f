use crate::sync::resource::{Resource, extract_tool_records, parse_resource_text};

use serde_json::json;

#[test]
fn given_valid_resource_text_when_parsed_then_records_returned() {
    let text = r#"{"jobs":[{"id":"j1"},{"id":"j2"}],"updatedAt":"now"}"#;

    let records = parse_resource_text(text, "jobs").expect("valid");

    assert_eq!(records.len(), 2);
}

/// **VALUE**: Fallback text without the expected top-level array is rejected.
///
/// **BUG THIS CATCHES**: An error page or an unrelated JSON file wiping the
/// polled tier.
#[test]
fn given_text_without_array_field_when_parsed_then_rejected() {
    assert!(parse_resource_text("<html>502</html>", "jobs").is_none());
    assert!(parse_resource_text(r#"{"jobs":{"id":"j1"}}"#, "jobs").is_none());
    assert!(parse_resource_text(r#"{"tasks":[]}"#, "jobs").is_none());
    assert!(parse_resource_text(r#"[{"id":"j1"}]"#, "jobs").is_none());
}

#[test]
fn given_tool_result_shapes_when_extracted_then_records_found() {
    // Object with field
    let records = extract_tool_records(json!({"jobs": [{"id": "a"}]}), "jobs");
    assert_eq!(records.map(|r| r.len()), Some(1));

    // Bare array
    let records = extract_tool_records(json!([{"id": "a"}, {"id": "b"}]), "jobs");
    assert_eq!(records.map(|r| r.len()), Some(2));

    // File read with JSON content
    let content = r#"{"tasks":[{"id":"t1","title":"x"}]}"#;
    let records = extract_tool_records(json!({"content": content}), "tasks");
    assert_eq!(records.map(|r| r.len()), Some(1));

    // Nothing usable
    assert!(extract_tool_records(json!({"other": 1}), "tasks").is_none());
}

#[test]
fn given_resources_when_tool_invocation_built_then_cron_lists_and_kanban_reads() {
    let cron = Resource::CronJobs.tool_invocation("/data/cron-jobs.json");
    assert_eq!(cron.tool, "cron");
    assert_eq!(cron.action.as_deref(), Some("list"));

    let kanban = Resource::KanbanTasks.tool_invocation("/data/kanban.json");
    assert_eq!(kanban.tool, "read");
    assert_eq!(kanban.args, Some(json!({"path": "data/kanban.json"})));
}
