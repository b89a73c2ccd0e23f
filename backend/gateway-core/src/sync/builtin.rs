use crate::error::SyncError;

use models::{AgentPresence, CronJob, ExecutionRun, HeartbeatSample, KanbanTask};

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Fixed default payload for the builtin tier. Never mutated after
/// construction. Empty unless the application supplies one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuiltinData {
    pub agents: Vec<AgentPresence>,
    pub executions: Vec<ExecutionRun>,
    pub heartbeats: Vec<HeartbeatSample>,
    pub cron_jobs: Vec<CronJob>,
    pub kanban_tasks: Vec<KanbanTask>,
}

impl BuiltinData {
    #[track_caller]
    pub fn from_json_str(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::builtin(format!("invalid builtin data: {e}")))
    }

    /// Read a seed file. A missing file yields the empty default.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::builtin(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }
}
