//! Fixed-interval fallback poll, run only while the gateway is not connected.

use crate::sync::resource::Resource;
use crate::sync::store::SyncInner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub(crate) struct FallbackPoller {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl FallbackPoller {
    /// Spawn the loop. The first round runs immediately.
    pub(crate) fn start(inner: Arc<SyncInner>) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let guard = Arc::clone(&active);
        let poll_interval = inner.settings.poll_interval;

        let handle = tokio::spawn(async move {
            debug!("Fallback poll started (every {poll_interval:?})");
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                for resource in Resource::ALL {
                    if !guard.load(Ordering::Acquire) {
                        return;
                    }
                    inner.poll_resource(resource, &guard).await;
                }
            }
        });

        Self { active, handle }
    }

    /// Clear the guard and abort the task. Anything still in flight is
    /// discarded.
    pub(crate) fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.handle.abort();
            debug!("Fallback poll stopped");
        }
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
