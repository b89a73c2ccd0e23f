use crate::gateway::ReconnectBackoff;

use std::time::Duration;

fn delays_secs(backoff: &mut ReconnectBackoff, count: usize) -> Vec<u64> {
    (0..count).map(|_| backoff.next_delay().as_secs()).collect()
}

/// **VALUE**: Pins the reconnect schedule to 1, 2, 4, 8, 16, then capped at 30.
///
/// **WHY THIS MATTERS**: A flapping gateway must not be hammered, and a dead
/// one must still be retried at a bounded interval forever.
///
/// **BUG THIS CATCHES**: Jitter left enabled, a multiplier other than 2, a cap
/// that is exceeded, or a schedule that gives up (max elapsed time).
#[test]
fn given_consecutive_failures_when_next_delay_called_then_doubles_up_to_cap() {
    // GIVEN: Default schedule
    let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));

    // WHEN: Seven consecutive failures
    let delays = delays_secs(&mut backoff, 7);

    // THEN: Non-decreasing, capped at 30
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
}

/// **VALUE**: A successful handshake resets the schedule.
///
/// **BUG THIS CATCHES**: After a long outage the client would otherwise wait
/// 30s before its first retry on the next, unrelated drop.
#[test]
fn given_advanced_schedule_when_reset_then_next_delay_is_initial() {
    // GIVEN: Schedule advanced to 8s
    let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
    let _ = delays_secs(&mut backoff, 4);

    // WHEN: Reset
    backoff.reset();

    // THEN: Starts over from 1s
    assert_eq!(delays_secs(&mut backoff, 3), vec![1, 2, 4]);
}

#[test]
fn given_millisecond_schedule_when_next_delay_called_then_scales_the_same_way() {
    let mut backoff =
        ReconnectBackoff::new(Duration::from_millis(10), Duration::from_millis(50));

    let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();

    assert_eq!(delays, vec![10, 20, 40, 50, 50]);
}
