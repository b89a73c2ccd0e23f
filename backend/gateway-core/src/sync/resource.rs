//! The two poll-driven resources and how their records are extracted.

use models::ToolInvocation;

use serde_json::Value;

pub const DEFAULT_CRON_JOBS_PATH: &str = "/data/cron-jobs.json";
pub const DEFAULT_KANBAN_PATH: &str = "/data/kanban.json";

const CRON_TOOL: &str = "cron";
const CRON_LIST_ACTION: &str = "list";
const READ_TOOL: &str = "read";
const CONTENT_FIELD: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    CronJobs,
    KanbanTasks,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::CronJobs, Resource::KanbanTasks];

    /// Top-level array field carrying the records.
    pub fn field(self) -> &'static str {
        match self {
            Resource::CronJobs => "jobs",
            Resource::KanbanTasks => "tasks",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resource::CronJobs => "cron jobs",
            Resource::KanbanTasks => "kanban tasks",
        }
    }

    /// Tool call used for the authoritative fetch after connecting.
    pub fn tool_invocation(self, fallback_path: &str) -> ToolInvocation {
        match self {
            Resource::CronJobs => ToolInvocation::new(CRON_TOOL).with_action(CRON_LIST_ACTION),
            Resource::KanbanTasks => ToolInvocation::new(READ_TOOL).with_args(serde_json::json!({
                "path": fallback_path.trim_start_matches('/'),
            })),
        }
    }
}

/// Validate fallback-resource text: JSON with `field` as a top-level array.
pub fn parse_resource_text(text: &str, field: &str) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value {
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}

/// Pull records out of a tool result.
///
/// Accepts a bare array, an object with `field`, or a file read whose
/// `content` (or the result itself) is JSON text of either shape.
pub fn extract_tool_records(result: Value, field: &str) -> Option<Vec<Value>> {
    match result {
        Value::Array(records) => Some(records),
        Value::String(text) => extract_from_text(&text, field),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(records)) => Some(records),
            _ => match map.remove(CONTENT_FIELD) {
                Some(Value::String(text)) => extract_from_text(&text, field),
                _ => None,
            },
        },
        _ => None,
    }
}

fn extract_from_text(text: &str, field: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}
