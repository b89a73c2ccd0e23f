use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for everything the reconciliation layer swallows or skips.
#[derive(Debug, Default)]
pub struct SyncStats {
    polls_applied: AtomicU64,
    polls_unchanged: AtomicU64,
    poll_failures: AtomicU64,
    tool_fetches_applied: AtomicU64,
    tool_fetch_failures: AtomicU64,
    live_events_applied: AtomicU64,
    live_events_ignored: AtomicU64,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatsSnapshot {
    pub polls_applied: u64,
    pub polls_unchanged: u64,
    pub poll_failures: u64,
    pub tool_fetches_applied: u64,
    pub tool_fetch_failures: u64,
    pub live_events_applied: u64,
    pub live_events_ignored: u64,
}

impl SyncStats {
    pub(crate) fn poll_applied(&self) {
        self.polls_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_unchanged(&self) {
        self.polls_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_failed(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tool_fetch_applied(&self) {
        self.tool_fetches_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tool_fetch_failed(&self) {
        self.tool_fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn live_applied(&self) {
        self.live_events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn live_ignored(&self) {
        self.live_events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            polls_applied: self.polls_applied.load(Ordering::Relaxed),
            polls_unchanged: self.polls_unchanged.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            tool_fetches_applied: self.tool_fetches_applied.load(Ordering::Relaxed),
            tool_fetch_failures: self.tool_fetch_failures.load(Ordering::Relaxed),
            live_events_applied: self.live_events_applied.load(Ordering::Relaxed),
            live_events_ignored: self.live_events_ignored.load(Ordering::Relaxed),
        }
    }
}
