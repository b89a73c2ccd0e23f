use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Reconnect delay schedule: initial, doubled per consecutive failure,
/// capped at max. Deterministic (no jitter) and never gives up.
#[derive(Debug)]
pub struct ReconnectBackoff {
    inner: ExponentialBackoff,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let inner = ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: BACKOFF_MULTIPLIER,
            max_interval: max,
            max_elapsed_time: None,
            ..Default::default()
        };
        Self { inner }
    }

    /// Delay before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        self.inner
            .next_backoff()
            .unwrap_or(self.inner.max_interval)
    }

    /// Back to the initial delay. Called after a successful handshake only.
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}
