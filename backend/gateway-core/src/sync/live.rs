//! Live-tier ingestion from gateway events.

use models::{AgentPresence, ExecutionRun, HeartbeatSample, Keyed};

use serde_json::Value;

/// Default cap on the heartbeat and execution buffers.
pub const DEFAULT_LIVE_CAP: usize = 50;

/// Build the live agents snapshot from a `presence` payload: an object keyed
/// by agent id. Entries that are not objects are skipped. Returns `None` if
/// the payload is not an object at all.
pub fn parse_presence(payload: &Value) -> Option<Vec<AgentPresence>> {
    let entries = payload.as_object()?;
    let agents = entries
        .iter()
        .filter(|(_, value)| value.is_object())
        .filter_map(|(key, value)| {
            let mut agent: AgentPresence = serde_json::from_value(value.clone()).ok()?;
            if agent.id.is_empty() {
                agent.id = key.clone();
            }
            Some(agent)
        })
        .collect();
    Some(agents)
}

/// Heartbeats: drop any prior sample for the agent, prepend, cap.
pub fn upsert_heartbeat(buffer: &mut Vec<HeartbeatSample>, sample: HeartbeatSample, cap: usize) {
    buffer.retain(|existing| existing.key() != sample.key());
    buffer.insert(0, sample);
    buffer.truncate(cap);
}

/// Executions: replace in place by run id, otherwise prepend and cap.
pub fn upsert_execution(buffer: &mut Vec<ExecutionRun>, run: ExecutionRun, cap: usize) {
    match buffer.iter_mut().find(|existing| existing.key() == run.key()) {
        Some(existing) => *existing = run,
        None => {
            buffer.insert(0, run);
            buffer.truncate(cap);
        }
    }
}
