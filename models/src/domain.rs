//! Domain records merged by the reconciliation layer.
//!
//! Each record keeps unknown JSON fields in `extra` so data from the gateway
//! or from a fallback resource survives a round trip through this client
//! unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier used for lookups and upserts.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentPresence {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyed for AgentPresence {
    fn key(&self) -> &str {
        &self.id
    }
}

/// One agent execution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyed for ExecutionRun {
    fn key(&self) -> &str {
        &self.run_id
    }
}

/// One heartbeat sample from a `tick` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSample {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyed for HeartbeatSample {
    fn key(&self) -> &str {
        &self.agent_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyed for CronJob {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Partial job accepted by `create_job`; the id is assigned locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewCronJob {
    pub name: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl NewCronJob {
    pub fn into_job(self, id: impl Into<String>) -> CronJob {
        CronJob {
            id: id.into(),
            name: self.name,
            schedule: self.schedule,
            enabled: self.enabled.unwrap_or_else(default_enabled),
            command: self.command,
            ..CronJob::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KanbanTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyed for KanbanTask {
    fn key(&self) -> &str {
        &self.id
    }
}

fn default_enabled() -> bool {
    true
}
