//! Lazy energy regeneration. There is no background timer: every read or
//! action settles the elapsed interval since `last_update` before anything
//! else looks at the player.

use tapcoin_types::{PlayerState, ENERGY_REGEN_PER_SEC};

/// Credits regeneration for the wall-clock time between `state.last_update`
/// and `now_ms`, clamped to `max_energy`, and snaps `last_update` forward.
///
/// Calling this twice with the same `now_ms` is a no-op the second time, so
/// an interval is never credited more than once. A `now_ms` in the past
/// (clock regression) changes nothing: energy never decreases here and
/// `last_update` never moves backwards.
pub fn advance(state: &mut PlayerState, now_ms: u64) {
    if now_ms <= state.last_update {
        return;
    }
    let elapsed_secs = (now_ms - state.last_update) as f64 / 1_000.0;
    let max_energy = f64::from(state.max_energy);
    state.energy = (state.energy + elapsed_secs * ENERGY_REGEN_PER_SEC).min(max_energy);
    state.last_update = now_ms;
}
