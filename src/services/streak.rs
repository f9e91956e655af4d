// SPDX-License-Identifier: MIT

//! Consecutive-day learning streak computation.
//!
//! Pure function of (previous streak, last completion, now); callers set
//! `last_completed_date` themselves after recording a completion.

use crate::time_utils::days_between;
use chrono::{DateTime, Utc};

/// Compute the streak after a completion at `now`.
///
/// Calendar-day rules:
/// - no previous completion: streak starts at 1
/// - same day: unchanged, but at least 1
/// - next day: previous + 1
/// - gap of 2+ days: broken, restart at 1
/// - `last` after `now` (clock skew, out-of-order delivery): treated as
///   same-day rather than erroring
pub fn compute_streak(
    previous_streak: u32,
    last_completed_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> u32 {
    let last = match last_completed_date {
        Some(last) => last,
        None => return 1,
    };

    match days_between(last, now) {
        0 => previous_streak.max(1),
        1 => previous_streak + 1,
        d if d > 1 => 1,
        // negative: skewed clock, keep the streak intact
        _ => previous_streak.max(1),
    }
}
