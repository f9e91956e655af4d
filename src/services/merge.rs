// SPDX-License-Identifier: MIT

//! Progress record reconciliation.
//!
//! Client and server may both have recorded completions independently
//! (offline devices, multiple devices). The merge must never lose a
//! completion recorded by either side and must never let a derived
//! aggregate (points, score, streak) regress.
//!
//! The policy is field-wise "most complete wins", not last-write-wins:
//! timestamps across devices are not trustworthy for resolving conflicts
//! on monotonic counters. The result is commutative, and idempotent for
//! every field except the two summed attempt counters
//! (`questions_answered` / `correct_answers`), which double under
//! self-merge; the orchestrator merges each client history into the
//! store at most once per attempt.

use crate::models::{ModuleProgress, ProgressRecord, TopicProgress};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Merge failure modes.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("records belong to different users: '{server}' vs '{client}'")]
    UserMismatch { server: String, client: String },
}

/// Reconcile two progress records for the same user.
///
/// `now` becomes the result's `updated_at`; it plays no part in conflict
/// resolution.
pub fn merge(
    server: &ProgressRecord,
    client: &ProgressRecord,
    now: DateTime<Utc>,
) -> Result<ProgressRecord, MergeError> {
    if server.user_id != client.user_id {
        return Err(MergeError::UserMismatch {
            server: server.user_id.clone(),
            client: client.user_id.clone(),
        });
    }

    let mut topics = server.topics.clone();
    for (topic_id, client_topic) in &client.topics {
        match topics.get_mut(topic_id) {
            Some(server_topic) => merge_topic(server_topic, client_topic),
            None => {
                topics.insert(topic_id.clone(), client_topic.clone());
            }
        }
    }

    Ok(ProgressRecord {
        user_id: server.user_id.clone(),
        topics,
        streak: server.streak.max(client.streak),
        last_completed_date: later(server.last_completed_date, client.last_completed_date),
        // max, not sum: both sides may already reflect the same underlying
        // completions through independent paths
        total_points: server.total_points.max(client.total_points),
        applied_events: server
            .applied_events
            .union(&client.applied_events)
            .cloned()
            .collect(),
        updated_at: format_utc_rfc3339(now),
    })
}

fn merge_topic(server: &mut TopicProgress, client: &TopicProgress) {
    server.completed = server.completed || client.completed;
    server.score = server.score.max(client.score);
    server.last_attempt = later(server.last_attempt, client.last_attempt);
    // Attempt counters are summed: each side only increments locally.
    // Overcounts if the same attempt was already synced once; the
    // orchestrator's single-merge-per-history discipline covers that.
    server.questions_answered = server.questions_answered.saturating_add(client.questions_answered);
    server.correct_answers = server.correct_answers.saturating_add(client.correct_answers);

    for (module_id, client_module) in &client.modules {
        match server.modules.get_mut(module_id) {
            Some(server_module) => merge_module(server_module, client_module),
            None => {
                server.modules.insert(module_id.clone(), client_module.clone());
            }
        }
    }

    // De-duplicated union in a deterministic order so merge(A,B) and
    // merge(B,A) produce identical records
    let union: BTreeSet<String> = server
        .completed_modules
        .iter()
        .chain(client.completed_modules.iter())
        .cloned()
        .collect();
    server.completed_modules = union.into_iter().collect();
}

fn merge_module(server: &mut ModuleProgress, client: &ModuleProgress) {
    server.completed = server.completed || client.completed;
    server.score = server.score.max(client.score);
    server.last_attempt = later(server.last_attempt, client.last_attempt);
}

/// Later of two optional timestamps; `None` is treated as earliest possible.
fn later(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (some, None) | (None, some) => some,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::completion::{apply_completion, CompletionEvent};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn completed_record(user: &str, topic: &str, module: &str, score: f64, at: &str) -> ProgressRecord {
        let mut record = ProgressRecord::empty(user);
        apply_completion(
            &mut record,
            &CompletionEvent {
                topic_id: topic.to_string(),
                module_id: module.to_string(),
                score,
                event_id: None,
            },
            ts(at),
        );
        record
    }

    /// Strip fields where commutativity is only up to ordering/timestamps.
    fn canonical(mut record: ProgressRecord) -> ProgressRecord {
        record.updated_at = String::new();
        record
    }

    #[test]
    fn test_user_mismatch_is_hard_error() {
        let a = ProgressRecord::empty("alice");
        let b = ProgressRecord::empty("bob");
        let err = merge(&a, &b, ts("2024-01-15T10:00:00Z")).unwrap_err();
        assert!(matches!(err, MergeError::UserMismatch { .. }));
    }

    #[test]
    fn test_disjoint_topics_union() {
        // server: points=100, streak=3, topic A; client: points=150, streak=1, topic B
        let mut server = completed_record("u1", "topic-a", "a-1", 1.0, "2024-01-10T10:00:00Z");
        server.total_points = 100;
        server.streak = 3;

        let mut client = completed_record("u1", "topic-b", "b-1", 1.0, "2024-01-12T10:00:00Z");
        client.total_points = 150;
        client.streak = 1;

        let merged = merge(&server, &client, ts("2024-01-13T00:00:00Z")).unwrap();

        assert_eq!(merged.total_points, 150);
        assert_eq!(merged.streak, 3);
        assert_eq!(merged.last_completed_date, Some(ts("2024-01-12T10:00:00Z")));
        assert!(merged.topics.contains_key("topic-a"));
        assert!(merged.topics.contains_key("topic-b"));
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_shared_topic_takes_most_complete() {
        // server has m1 at 0.6; client has m1 at 0.8 and m2 at 1.0
        let server = completed_record("u1", "t", "m1", 0.6, "2024-01-10T10:00:00Z");
        let mut client = completed_record("u1", "t", "m1", 0.8, "2024-01-11T10:00:00Z");
        apply_completion(
            &mut client,
            &CompletionEvent {
                topic_id: "t".to_string(),
                module_id: "m2".to_string(),
                score: 1.0,
                event_id: None,
            },
            ts("2024-01-11T11:00:00Z"),
        );

        let merged = merge(&server, &client, ts("2024-01-12T00:00:00Z")).unwrap();
        let topic = &merged.topics["t"];

        assert_eq!(topic.score, 1.0);
        assert_eq!(topic.modules["m1"].score, 0.8);
        assert_eq!(topic.modules["m2"].score, 1.0);
        assert_eq!(
            topic.completed_modules,
            vec!["m1".to_string(), "m2".to_string()]
        );
        assert_eq!(topic.last_attempt, Some(ts("2024-01-11T11:00:00Z")));
        // attempt counters are summed across sides: 1 (server) + 2 (client)
        assert_eq!(topic.questions_answered, 3);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = completed_record("u1", "t", "m1", 0.6, "2024-01-10T10:00:00Z");
        let mut b = completed_record("u1", "t", "m1", 0.8, "2024-01-11T10:00:00Z");
        apply_completion(
            &mut b,
            &CompletionEvent {
                topic_id: "other".to_string(),
                module_id: "o-1".to_string(),
                score: 0.9,
                event_id: Some("evt-1".to_string()),
            },
            ts("2024-01-11T12:00:00Z"),
        );

        let now = ts("2024-01-12T00:00:00Z");
        let ab = canonical(merge(&a, &b, now).unwrap());
        let ba = canonical(merge(&b, &a, now).unwrap());
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_self_merge_idempotent_except_counters() {
        let record = completed_record("u1", "t", "m1", 0.8, "2024-01-10T10:00:00Z");
        let merged = merge(&record, &record, ts("2024-01-11T00:00:00Z")).unwrap();

        assert_eq!(merged.total_points, record.total_points);
        assert_eq!(merged.streak, record.streak);
        assert_eq!(merged.last_completed_date, record.last_completed_date);
        assert_eq!(merged.topics["t"].score, record.topics["t"].score);
        assert_eq!(
            merged.topics["t"].completed_modules,
            record.topics["t"].completed_modules
        );
        assert_eq!(merged.applied_events, record.applied_events);
        // the documented non-idempotence: attempt counters double
        assert_eq!(
            merged.topics["t"].questions_answered,
            2 * record.topics["t"].questions_answered
        );
    }

    #[test]
    fn test_null_last_completed_treated_as_earliest() {
        let server = ProgressRecord::empty("u1");
        let client = completed_record("u1", "t", "m1", 1.0, "2024-01-10T10:00:00Z");

        let merged = merge(&server, &client, ts("2024-01-11T00:00:00Z")).unwrap();
        assert_eq!(merged.last_completed_date, Some(ts("2024-01-10T10:00:00Z")));

        let both_empty = merge(
            &ProgressRecord::empty("u1"),
            &ProgressRecord::empty("u1"),
            ts("2024-01-11T00:00:00Z"),
        )
        .unwrap();
        assert!(both_empty.last_completed_date.is_none());
    }

    #[test]
    fn test_monotonicity_across_merge_and_completion_sequence() {
        let mut device_a = completed_record("u1", "t", "m1", 0.5, "2024-01-10T10:00:00Z");
        let device_b = completed_record("u1", "t", "m2", 0.9, "2024-01-11T10:00:00Z");

        let mut last_points = device_a.total_points;
        let mut last_score = device_a.topics["t"].score;

        device_a = merge(&device_a, &device_b, ts("2024-01-11T11:00:00Z")).unwrap();
        assert!(device_a.total_points >= last_points);
        assert!(device_a.topics["t"].score >= last_score);
        last_points = device_a.total_points;
        last_score = device_a.topics["t"].score;

        apply_completion(
            &mut device_a,
            &CompletionEvent {
                topic_id: "t".to_string(),
                module_id: "m1".to_string(),
                score: 0.3,
                event_id: None,
            },
            ts("2024-01-12T10:00:00Z"),
        );
        assert!(device_a.total_points >= last_points);
        assert!(device_a.topics["t"].score >= last_score);
        assert!(device_a.validate().is_ok());
    }

    #[test]
    fn test_merged_result_preserves_module_invariant() {
        let server = completed_record("u1", "t", "m1", 0.6, "2024-01-10T10:00:00Z");
        let client = completed_record("u1", "t", "m2", 0.7, "2024-01-11T10:00:00Z");

        let merged = merge(&server, &client, ts("2024-01-12T00:00:00Z")).unwrap();
        assert!(merged.topics["t"].modules_consistent());
    }

    #[test]
    fn test_summed_counters_saturate_instead_of_wrapping() {
        let mut server = completed_record("u1", "t", "m1", 1.0, "2024-01-10T10:00:00Z");
        let mut client = completed_record("u1", "t", "m1", 1.0, "2024-01-11T10:00:00Z");
        server.topics.get_mut("t").unwrap().questions_answered = u32::MAX - 1;
        client.topics.get_mut("t").unwrap().questions_answered = u32::MAX - 1;
        client.topics.get_mut("t").unwrap().correct_answers = u32::MAX - 1;

        let merged = merge(&server, &client, ts("2024-01-12T00:00:00Z")).unwrap();
        let topic = &merged.topics["t"];

        // Pinned at the ceiling, never wrapped back below either input
        assert_eq!(topic.questions_answered, u32::MAX);
        assert!(topic.questions_answered >= u32::MAX - 1);
        assert!(topic.correct_answers >= u32::MAX - 1);
    }
}
