// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting and calendar-day math.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Signed number of whole calendar days between two timestamps,
/// with the time-of-day stripped before comparing.
///
/// Positive when `later` falls on a later calendar day than `earlier`,
/// negative when it falls on an earlier one (clock skew).
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    later
        .date_naive()
        .signed_duration_since(earlier.date_naive())
        .num_days()
}

/// Whether two timestamps fall on the same UTC calendar day.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Date seed for deterministic daily selections: `year*10000 + month*100 + day`.
///
/// All users see the same seed for a given calendar date.
pub fn date_seed(date: DateTime<Utc>) -> u32 {
    let d = date.date_naive();
    d.year() as u32 * 10_000 + d.month() * 100 + d.day()
}
