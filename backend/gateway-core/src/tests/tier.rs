use crate::sync::tier::{Tier, TieredBuffer, select_tier};

use models::CronJob;

fn job(id: &str) -> CronJob {
    CronJob {
        id: id.to_string(),
        name: format!("job {id}"),
        ..CronJob::default()
    }
}

/// **VALUE**: The precedence rule across all the cases that matter.
///
/// **WHY THIS MATTERS**: This one function decides what every consumer sees.
///
/// **BUG THIS CATCHES**: Live data served while disconnected, polled data
/// hiding non-empty live data, or builtin shown when polled has data.
#[test]
fn given_tier_contents_when_select_tier_then_follows_precedence() {
    // Live wins only when connected and non-empty
    assert_eq!(select_tier(true, 3, 5), Tier::Live);
    assert_eq!(select_tier(true, 0, 5), Tier::Polled);
    assert_eq!(select_tier(false, 3, 5), Tier::Polled);

    // Polled next, then builtin
    assert_eq!(select_tier(false, 0, 1), Tier::Polled);
    assert_eq!(select_tier(false, 3, 0), Tier::Builtin);
    assert_eq!(select_tier(true, 0, 0), Tier::Builtin);
    assert_eq!(select_tier(false, 0, 0), Tier::Builtin);
}

/// **VALUE**: Losing the connection changes which tier is read, not what the
/// tiers hold.
///
/// **BUG THIS CATCHES**: Clearing the live buffer on disconnect, so a quick
/// reconnect shows stale polled data until the next snapshot.
#[test]
fn given_live_and_polled_when_connection_flaps_then_no_data_lost() {
    // GIVEN
    let mut buffer = TieredBuffer::with_builtin(vec![job("builtin")]);
    buffer.live = vec![job("live")];
    buffer.polled = vec![job("polled")];

    // WHEN / THEN
    assert_eq!(buffer.view(true)[0].id, "live");
    assert_eq!(buffer.view(false)[0].id, "polled");
    assert_eq!(buffer.view(true)[0].id, "live");
    assert!(buffer.find(false, "live").is_none());
    assert!(buffer.find(true, "live").is_some());
}

#[test]
fn given_empty_polled_when_seeded_then_copy_of_builtin_and_builtin_untouched() {
    // GIVEN
    let mut buffer = TieredBuffer::with_builtin(vec![job("a"), job("b")]);

    // WHEN
    buffer.polled_mut_seeded().retain(|j| j.id != "a");

    // THEN
    assert_eq!(buffer.polled.len(), 1);
    assert_eq!(buffer.builtin().len(), 2, "Builtin is never mutated");
}

#[test]
fn given_non_empty_polled_when_seeded_then_polled_kept() {
    let mut buffer = TieredBuffer::with_builtin(vec![job("a")]);
    buffer.polled = vec![job("p")];

    let polled = buffer.polled_mut_seeded();

    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].id, "p");
}
