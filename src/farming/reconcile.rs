//! Offline reconciler: advance crop timers by elapsed wall time.
//!
//! The periodic tick and the resume path both come through here, so a
//! farm ends up in the same state whether time passed in many small steps
//! or one jump. Nothing in this module touches the ledger or unlocks.

use std::time::Duration;

use super::farm::Farm;
use crate::shared::*;

/// Advance the farm by `elapsed` from its last observation. Returns the
/// slots that became Ready.
pub fn reconcile(farm: &mut Farm, elapsed: Duration) -> Vec<usize> {
    let target = farm.last_observed_at.plus(elapsed);
    let ripened = farm.check_growth(target);
    farm.last_observed_at = target;
    ripened
}

/// Apply a reported absence of `elapsed`, never past `now`. Ticks and
/// commands that ran since the host woke have already counted part of it.
pub fn resume(farm: &mut Farm, elapsed: Duration, now: Timestamp) -> Vec<usize> {
    let unobserved = now.saturating_since(farm.last_observed_at);
    reconcile(farm, elapsed.min(unobserved))
}

/// Bring the farm up to `now`. Observation time never moves backwards.
pub fn catch_up(farm: &mut Farm, now: Timestamp) -> Vec<usize> {
    let elapsed = now.saturating_since(farm.last_observed_at);
    reconcile(farm, elapsed)
}
