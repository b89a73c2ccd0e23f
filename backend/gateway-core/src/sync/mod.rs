//! State reconciliation layer.
//!
//! For each domain (agents, executions, heartbeats, cron jobs, kanban tasks)
//! three buffers are kept: *live* from gateway events, *polled* from fallback
//! fetches and local edits, *builtin* from a fixed seed. Reads are served from
//! exactly one of them, chosen by [`select_tier`].
//!
//! Poll and ingestion failures are never returned to consumers; they are
//! logged and counted in [`SyncStats`].

pub mod builtin;
pub mod live;
mod poller;
pub mod resource;
pub mod stats;
pub mod store;
pub mod tier;

pub use builtin::BuiltinData;
pub use resource::Resource;
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use store::{DashboardSync, Domain, Priority, SyncSettings};
pub use tier::{Tier, TieredBuffer, select_tier};
