// SPDX-License-Identifier: MIT

//! Module completion application.
//!
//! Pure state transition: takes the record, the completion event, and
//! `now`, and returns whether the event was applied. Persistence belongs
//! to the store; the transactional write path in `db::firestore` calls
//! this inside a read-modify-write transaction.

use crate::models::{ModuleProgress, ProgressRecord, TopicProgress};
use crate::services::streak::compute_streak;
use crate::time_utils::{format_utc_rfc3339, same_calendar_day};
use chrono::{DateTime, Utc};

/// Points awarded per module completion.
pub const POINTS_PER_MODULE: u32 = 50;

/// Scores above this threshold count as a correct answer.
pub const PASS_THRESHOLD: f64 = 0.7;

/// A single "user finished module X with score Y" occurrence.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub topic_id: String,
    pub module_id: String,
    /// Score in [0, 1]; callers default to 1.0 when the client path
    /// doesn't supply one.
    pub score: f64,
    /// Stable idempotency key. Events carrying a key already recorded in
    /// `applied_events` are skipped whole.
    pub event_id: Option<String>,
}

/// Apply a completion event to a progress record.
///
/// Unknown topic/module IDs are created with zeroed counters rather than
/// rejected, to tolerate catalog drift (lenient-create, not
/// silent-ignore).
///
/// Returns `true` if the event was applied, `false` if it was an
/// idempotent duplicate (known `event_id`).
///
/// Without an `event_id`, re-applying the same completion on the same day
/// bumps the attempt counters again (they are attempt counters, not
/// idempotent) but never double-counts the streak or regresses a score.
pub fn apply_completion(
    record: &mut ProgressRecord,
    event: &CompletionEvent,
    now: DateTime<Utc>,
) -> bool {
    if let Some(event_id) = &event.event_id {
        if record.applied_events.contains(event_id) {
            return false;
        }
        record.applied_events.insert(event_id.clone());
    }

    let score = event.score.clamp(0.0, 1.0);

    let topic = record
        .topics
        .entry(event.topic_id.clone())
        .or_insert_with(TopicProgress::default);

    let module = topic
        .modules
        .entry(event.module_id.clone())
        .or_insert_with(ModuleProgress::default);
    module.completed = true;
    module.score = module.score.max(score);
    module.last_attempt = Some(now);

    if !topic.completed_modules.contains(&event.module_id) {
        topic.completed_modules.push(event.module_id.clone());
    }

    // Topic is flagged completed on the first module completion
    topic.completed = true;
    topic.score = topic.score.max(score);
    topic.last_attempt = Some(now);
    topic.questions_answered += 1;
    if score > PASS_THRESHOLD {
        topic.correct_answers += 1;
    }

    record.total_points += POINTS_PER_MODULE;
    record.streak = compute_streak(record.streak, record.last_completed_date, now);
    record.last_completed_date = Some(now);
    record.updated_at = format_utc_rfc3339(now);

    true
}

/// Whether a module is completed and its last attempt falls on the same
/// calendar day as `now`.
pub fn was_module_completed_today(
    record: &ProgressRecord,
    topic_id: &str,
    module_id: &str,
    now: DateTime<Utc>,
) -> bool {
    record
        .topics
        .get(topic_id)
        .and_then(|topic| topic.modules.get(module_id))
        .is_some_and(|module| {
            module.completed
                && module
                    .last_attempt
                    .is_some_and(|at| same_calendar_day(at, now))
        })
}

/// Whether every listed module was completed today.
pub fn all_modules_completed_today(
    record: &ProgressRecord,
    topic_id: &str,
    module_ids: &[String],
    now: DateTime<Utc>,
) -> bool {
    module_ids
        .iter()
        .all(|module_id| was_module_completed_today(record, topic_id, module_id, now))
}
