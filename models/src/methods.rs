//! Method and event names understood by the gateway, plus the typed params
//! of the convenience calls.

use serde::{Deserialize, Serialize};

/// Reserved handshake method.
pub const CONNECT: &str = "connect";
pub const SYSTEM_PRESENCE: &str = "system-presence";
pub const AGENT: &str = "agent";
pub const CRON_LIST: &str = "cron.list";
pub const CRON_STATUS: &str = "cron.status";
pub const CRON_RUNS: &str = "cron.runs";
pub const HEALTH: &str = "health";

pub const EVENT_PRESENCE: &str = "presence";
pub const EVENT_TICK: &str = "tick";
pub const EVENT_AGENT: &str = "agent";

/// Subscribing under this name receives every event.
pub const WILDCARD: &str = "*";

/// Params of the `agent` call: deliver one message to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentParams {
    pub agent_id: String,
    pub message: String,
    pub idempotency_key: String,
}

/// Params of `cron.runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronRunsParams {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}
