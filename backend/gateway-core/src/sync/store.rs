//! The reconciliation store: one merged view per domain.

use crate::error::{GatewayError, SyncError};
use crate::gateway::registry::lock;
use crate::gateway::{GatewayClient, Subscription};
use crate::sync::builtin::BuiltinData;
use crate::sync::live::{DEFAULT_LIVE_CAP, parse_presence, upsert_execution, upsert_heartbeat};
use crate::sync::poller::FallbackPoller;
use crate::sync::resource::{
    DEFAULT_CRON_JOBS_PATH, DEFAULT_KANBAN_PATH, Resource, extract_tool_records,
    parse_resource_text,
};
use crate::sync::stats::{SyncStats, SyncStatsSnapshot};
use crate::sync::tier::{Tier, TieredBuffer};
use crate::tools::ToolClient;

use models::methods::{EVENT_AGENT, EVENT_PRESENCE, EVENT_TICK};
use models::{
    AgentPresence, CronJob, ExecutionRun, GatewayEvent, HeartbeatSample, KanbanTask, NewCronJob,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const URGENT_PREFIX: &str = "[URGENT] ";
const LOW_PREFIX: &str = "[LOW] ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub cron_jobs_path: String,
    pub kanban_path: String,
    /// Cap for the heartbeat and execution live buffers.
    pub live_cap: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cron_jobs_path: DEFAULT_CRON_JOBS_PATH.to_string(),
            kanban_path: DEFAULT_KANBAN_PATH.to_string(),
            live_cap: DEFAULT_LIVE_CAP,
        }
    }
}

impl SyncSettings {
    fn path_for(&self, resource: Resource) -> &str {
        match resource {
            Resource::CronJobs => &self.cron_jobs_path,
            Resource::KanbanTasks => &self.kanban_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Agents,
    Executions,
    Heartbeats,
    CronJobs,
    KanbanTasks,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Agents,
        Domain::Executions,
        Domain::Heartbeats,
        Domain::CronJobs,
        Domain::KanbanTasks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Agents => "agents",
            Domain::Executions => "executions",
            Domain::Heartbeats => "heartbeats",
            Domain::CronJobs => "cron_jobs",
            Domain::KanbanTasks => "kanban_tasks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// The message as sent to the agent.
    pub fn apply(self, message: &str) -> String {
        match self {
            Priority::High => format!("{URGENT_PREFIX}{message}"),
            Priority::Normal => message.to_string(),
            Priority::Low => format!("{LOW_PREFIX}{message}"),
        }
    }
}

struct Tiers {
    agents: TieredBuffer<AgentPresence>,
    executions: TieredBuffer<ExecutionRun>,
    heartbeats: TieredBuffer<HeartbeatSample>,
    cron_jobs: TieredBuffer<CronJob>,
    kanban_tasks: TieredBuffer<KanbanTask>,
}

impl Tiers {
    fn from_builtin(builtin: BuiltinData) -> Self {
        Self {
            agents: TieredBuffer::with_builtin(builtin.agents),
            executions: TieredBuffer::with_builtin(builtin.executions),
            heartbeats: TieredBuffer::with_builtin(builtin.heartbeats),
            cron_jobs: TieredBuffer::with_builtin(builtin.cron_jobs),
            kanban_tasks: TieredBuffer::with_builtin(builtin.kanban_tasks),
        }
    }

    fn active_tier(&self, domain: Domain, connected: bool) -> Tier {
        match domain {
            Domain::Agents => self.agents.active_tier(connected),
            Domain::Executions => self.executions.active_tier(connected),
            Domain::Heartbeats => self.heartbeats.active_tier(connected),
            Domain::CronJobs => self.cron_jobs.active_tier(connected),
            Domain::KanbanTasks => self.kanban_tasks.active_tier(connected),
        }
    }
}

pub(crate) struct SyncInner {
    gateway: GatewayClient,
    tools: ToolClient,
    pub(crate) settings: SyncSettings,
    tiers: RwLock<Tiers>,
    /// Last raw text applied per fallback resource.
    last_text: Mutex<HashMap<Resource, String>>,
    stats: SyncStats,
    running: AtomicBool,
}

impl SyncInner {
    fn read<R>(&self, f: impl FnOnce(&Tiers) -> R) -> R {
        let tiers = self.tiers.read().unwrap_or_else(PoisonError::into_inner);
        f(&tiers)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tiers) -> R) -> R {
        let mut tiers = self.tiers.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tiers)
    }

    fn connected(&self) -> bool {
        self.gateway.is_connected()
    }

    fn on_presence(&self, event: &GatewayEvent) {
        match parse_presence(&event.payload) {
            Some(agents) => {
                self.write(|t| t.agents.live = agents);
                self.stats.live_applied();
            }
            None => {
                debug!("Ignoring presence event with non-object payload");
                self.stats.live_ignored();
            }
        }
    }

    fn on_tick(&self, event: &GatewayEvent) {
        match serde_json::from_value::<HeartbeatSample>(event.payload.clone()) {
            Ok(sample) if !sample.agent_id.is_empty() => {
                let cap = self.settings.live_cap;
                self.write(|t| upsert_heartbeat(&mut t.heartbeats.live, sample, cap));
                self.stats.live_applied();
            }
            Ok(_) => {
                debug!("Ignoring tick event without agentId");
                self.stats.live_ignored();
            }
            Err(e) => {
                debug!("Ignoring unparsable tick event: {e}");
                self.stats.live_ignored();
            }
        }
    }

    fn on_agent(&self, event: &GatewayEvent) {
        match serde_json::from_value::<ExecutionRun>(event.payload.clone()) {
            Ok(run) if !run.run_id.is_empty() => {
                let cap = self.settings.live_cap;
                self.write(|t| upsert_execution(&mut t.executions.live, run, cap));
                self.stats.live_applied();
            }
            Ok(_) => {
                debug!("Ignoring agent event without runId");
                self.stats.live_ignored();
            }
            Err(e) => {
                debug!("Ignoring unparsable agent event: {e}");
                self.stats.live_ignored();
            }
        }
    }

    /// Replace the whole polled tier of one resource.
    fn replace_polled(
        &self,
        resource: Resource,
        records: Vec<Value>,
    ) -> Result<usize, serde_json::Error> {
        match resource {
            Resource::CronJobs => {
                let jobs = records
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<CronJob>, _>>()?;
                let count = jobs.len();
                self.write(|t| t.cron_jobs.polled = jobs);
                Ok(count)
            }
            Resource::KanbanTasks => {
                let tasks = records
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<KanbanTask>, _>>()?;
                let count = tasks.len();
                self.write(|t| t.kanban_tasks.polled = tasks);
                Ok(count)
            }
        }
    }

    /// One fallback fetch. Every failure is swallowed and counted.
    pub(crate) async fn poll_resource(&self, resource: Resource, guard: &AtomicBool) {
        let path = self.settings.path_for(resource);
        let text = match self.tools.fetch_resource(path).await {
            Ok(text) => text,
            Err(e) => {
                debug!("Poll of {} failed: {e}", resource.label());
                self.stats.poll_failed();
                return;
            }
        };

        if !guard.load(Ordering::Acquire) {
            debug!("Discarding {} poll result after stop", resource.label());
            return;
        }

        if lock(&self.last_text).get(&resource) == Some(&text) {
            self.stats.poll_unchanged();
            return;
        }

        let Some(records) = parse_resource_text(&text, resource.field()) else {
            warn!(
                "Fallback {} at {path} has no top-level '{}' array; keeping previous data",
                resource.label(),
                resource.field()
            );
            self.stats.poll_failed();
            return;
        };

        match self.replace_polled(resource, records) {
            Ok(count) => {
                lock(&self.last_text).insert(resource, text);
                self.stats.poll_applied();
                debug!("Applied {count} {} from fallback poll", resource.label());
            }
            Err(e) => {
                warn!("Fallback {} rejected: {e}", resource.label());
                self.stats.poll_failed();
            }
        }
    }

    /// Immediate post-connect fetch through the tool endpoint.
    async fn fetch_authoritative(&self, resource: Resource) {
        let invocation = resource.tool_invocation(self.settings.path_for(resource));
        let result = match self.tools.invoke(&invocation).await {
            Ok(result) => result,
            Err(e) => {
                debug!("Authoritative fetch of {} failed: {e}", resource.label());
                self.stats.tool_fetch_failed();
                return;
            }
        };

        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let Some(records) = extract_tool_records(result, resource.field()) else {
            debug!("Tool result for {} has no records", resource.label());
            self.stats.tool_fetch_failed();
            return;
        };

        match self.replace_polled(resource, records) {
            Ok(count) => {
                // The next fallback poll must not be skipped as unchanged.
                lock(&self.last_text).remove(&resource);
                self.stats.tool_fetch_applied();
                debug!("Applied {count} {} from tool fetch", resource.label());
            }
            Err(e) => {
                debug!("Tool result for {} rejected: {e}", resource.label());
                self.stats.tool_fetch_failed();
            }
        }
    }
}

struct Lifecycle {
    subscriptions: Vec<Subscription>,
    supervisor: JoinHandle<()>,
}

impl Lifecycle {
    fn unsubscribe_all(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// Merged per-domain view over live events, fallback polls, and builtin
/// defaults, plus the consumer actions.
///
/// Reads pick the active tier on every call (see [`crate::sync::select_tier`]).
/// Nothing is cleared when the connection drops; only the active tier moves.
pub struct DashboardSync {
    inner: Arc<SyncInner>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl DashboardSync {
    pub fn new(
        gateway: GatewayClient,
        tools: ToolClient,
        builtin: BuiltinData,
        settings: SyncSettings,
    ) -> Self {
        let inner = SyncInner {
            gateway,
            tools,
            settings,
            tiers: RwLock::new(Tiers::from_builtin(builtin)),
            last_text: Mutex::new(HashMap::new()),
            stats: SyncStats::default(),
            running: AtomicBool::new(false),
        };
        Self {
            inner: Arc::new(inner),
            lifecycle: Mutex::new(None),
        }
    }

    /// Subscribe to gateway events and state, and start the poll lifecycle.
    /// Idempotent. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.is_some() {
            debug!("Dashboard sync already started");
            return;
        }

        self.inner.running.store(true, Ordering::Release);
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let gateway = &self.inner.gateway;
        let weak = Arc::downgrade(&self.inner);

        let subscriptions = vec![
            gateway.on(EVENT_PRESENCE, with_inner(&weak, SyncInner::on_presence)),
            gateway.on(EVENT_TICK, with_inner(&weak, SyncInner::on_tick)),
            gateway.on(EVENT_AGENT, with_inner(&weak, SyncInner::on_agent)),
            gateway.on_state_change({
                let wake_tx = wake_tx.clone();
                move |_| {
                    let _ = wake_tx.send(());
                }
            }),
        ];

        // Subscribed first, so no transition can slip between this and the
        // supervisor's first read of the state.
        let _ = wake_tx.send(());
        let supervisor = tokio::spawn(supervise(Arc::clone(&self.inner), wake_rx));

        *lifecycle = Some(Lifecycle {
            subscriptions,
            supervisor,
        });
        info!("Dashboard sync started");
    }

    /// Unsubscribe, stop polling, and wait for the lifecycle task to end.
    pub async fn shutdown(&self) {
        let taken = lock(&self.lifecycle).take();
        let Some(mut lifecycle) = taken else {
            return;
        };

        self.inner.running.store(false, Ordering::Release);
        lifecycle.unsubscribe_all();
        // The state handler held the last sender; the supervisor now drains.
        let _ = lifecycle.supervisor.await;
        info!("Dashboard sync stopped");
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    pub fn tools(&self) -> &ToolClient {
        &self.inner.tools
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn active_tier(&self, domain: Domain) -> Tier {
        let connected = self.inner.connected();
        self.inner.read(|t| t.active_tier(domain, connected))
    }

    pub fn agents(&self) -> Vec<AgentPresence> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.agents.view(connected).to_vec())
    }

    pub fn agent(&self, id: &str) -> Option<AgentPresence> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.agents.find(connected, id))
    }

    pub fn executions(&self) -> Vec<ExecutionRun> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.executions.view(connected).to_vec())
    }

    pub fn execution(&self, run_id: &str) -> Option<ExecutionRun> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.executions.find(connected, run_id))
    }

    pub fn heartbeats(&self) -> Vec<HeartbeatSample> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.heartbeats.view(connected).to_vec())
    }

    pub fn heartbeat(&self, agent_id: &str) -> Option<HeartbeatSample> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.heartbeats.find(connected, agent_id))
    }

    pub fn cron_jobs(&self) -> Vec<CronJob> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.cron_jobs.view(connected).to_vec())
    }

    pub fn cron_job(&self, id: &str) -> Option<CronJob> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.cron_jobs.find(connected, id))
    }

    pub fn kanban_tasks(&self) -> Vec<KanbanTask> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.kanban_tasks.view(connected).to_vec())
    }

    pub fn kanban_task(&self, id: &str) -> Option<KanbanTask> {
        let connected = self.inner.connected();
        self.inner.read(|t| t.kanban_tasks.find(connected, id))
    }

    /// Replace the job with the same id in the polled tier. Local only.
    ///
    /// Returns false if no job has that id; the tiers are then left as they
    /// were.
    pub fn update_job(&self, job: CronJob) -> bool {
        self.inner.write(|t| {
            if !t.cron_jobs.edit_base().iter().any(|existing| existing.id == job.id) {
                return false;
            }
            let jobs = t.cron_jobs.polled_mut_seeded();
            match jobs.iter_mut().find(|existing| existing.id == job.id) {
                Some(existing) => {
                    *existing = job;
                    true
                }
                None => false,
            }
        })
    }

    /// Append a new job with a fresh `job-<uuid>` id. Local only.
    pub fn create_job(&self, new_job: NewCronJob) -> CronJob {
        let job = new_job.into_job(format!("job-{}", Uuid::new_v4()));
        self.inner.write(|t| t.cron_jobs.polled_mut_seeded().push(job.clone()));
        debug!("Created local job {}", job.id);
        job
    }

    /// Remove a job from the polled tier. Local only. An unknown id changes
    /// nothing.
    pub fn delete_job(&self, id: &str) -> bool {
        self.inner.write(|t| {
            if !t.cron_jobs.edit_base().iter().any(|job| job.id == id) {
                return false;
            }
            let jobs = t.cron_jobs.polled_mut_seeded();
            let before = jobs.len();
            jobs.retain(|job| job.id != id);
            jobs.len() != before
        })
    }

    /// Send a message to an agent. Fails before any network call when the
    /// gateway is not connected. No local execution record is created.
    pub async fn dispatch(
        &self,
        agent_id: &str,
        message: &str,
        priority: Priority,
    ) -> Result<Value, SyncError> {
        if !self.inner.connected() {
            return Err(GatewayError::not_connected().into());
        }
        let message = priority.apply(message);
        Ok(self.inner.gateway.agent_send(agent_id, &message).await?)
    }

    pub async fn memory_search(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<Value, SyncError> {
        Ok(self.inner.tools.memory_search(query, max_results).await?)
    }

    pub async fn memory_get(
        &self,
        path: &str,
        from: Option<u32>,
        lines: Option<u32>,
    ) -> Result<Value, SyncError> {
        Ok(self.inner.tools.memory_get(path, from, lines).await?)
    }
}

impl Drop for DashboardSync {
    fn drop(&mut self) {
        if let Some(mut lifecycle) = lock(&self.lifecycle).take() {
            self.inner.running.store(false, Ordering::Release);
            lifecycle.unsubscribe_all();
            lifecycle.supervisor.abort();
        }
    }
}

fn with_inner(
    weak: &Weak<SyncInner>,
    handler: fn(&SyncInner, &GatewayEvent),
) -> impl Fn(&GatewayEvent) + Send + Sync + 'static {
    let weak = weak.clone();
    move |event| {
        if let Some(inner) = weak.upgrade() {
            handler(&inner, event);
        }
    }
}

/// Drives polling from connection state: poll while not connected, fetch
/// through the tool endpoint once on every connect.
async fn supervise(inner: Arc<SyncInner>, mut wake_rx: mpsc::UnboundedReceiver<()>) {
    let mut poller: Option<FallbackPoller> = None;
    let mut fetches = JoinSet::new();
    let mut last_connected: Option<bool> = None;

    loop {
        tokio::select! {
            wake = wake_rx.recv() => {
                if wake.is_none() {
                    break;
                }
                let connected = inner.connected();
                if last_connected != Some(connected) {
                    last_connected = Some(connected);
                    if connected {
                        if let Some(poller) = poller.take() {
                            poller.stop();
                        }
                        for resource in Resource::ALL {
                            let inner = Arc::clone(&inner);
                            fetches.spawn(async move { inner.fetch_authoritative(resource).await });
                        }
                    } else if poller.is_none() {
                        poller = Some(FallbackPoller::start(Arc::clone(&inner)));
                    }
                }
            }
            Some(_) = fetches.join_next(), if !fetches.is_empty() => {}
        }
    }

    fetches.abort_all();
    if let Some(poller) = poller.take() {
        poller.stop();
    }
}
