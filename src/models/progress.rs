// SPDX-License-Identifier: MIT

//! Learning-progress aggregate stored one document per user.
//!
//! The same shape is cached on the device and held server-side; the two
//! copies are reconciled by the merge engine. Every collection field uses
//! `#[serde(default)]` so older documents with absent nested maps
//! deserialize cleanly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-user progress aggregate.
///
/// Stored at: `learning_progress/{user_id}`
///
/// Server copy is authoritative at sync time; conflict resolution is
/// field-wise "most complete wins", never last-write-wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    /// Owning user (also the document ID). Immutable.
    pub user_id: String,

    /// Per-topic progress, keyed by topic ID.
    #[serde(default)]
    pub topics: HashMap<String, TopicProgress>,

    /// Consecutive calendar days with at least one completion.
    #[serde(default)]
    pub streak: u32,

    /// Most recent completion across all topics. `None` only before the
    /// user's first completion ever.
    #[serde(default)]
    pub last_completed_date: Option<DateTime<Utc>>,

    /// Lifetime points. Monotonically non-decreasing; this subsystem
    /// never subtracts points.
    #[serde(default)]
    pub total_points: u32,

    /// Idempotency keys of completion events already applied to this
    /// record (for duplicate detection across retries and devices).
    #[serde(default)]
    pub applied_events: HashSet<String>,

    /// Last write timestamp (ISO 8601). Observability only, never used
    /// for conflict resolution.
    #[serde(default)]
    pub updated_at: String,
}

/// Progress within one topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TopicProgress {
    /// Set by the *first* module completion in the topic, not by
    /// finishing every module. As-built semantics, preserved for
    /// consumers that read it as "user has started earning this topic".
    #[serde(default)]
    pub completed: bool,

    /// Best score seen across attempts, in [0, 1].
    #[serde(default)]
    pub score: f64,

    /// Most recent activity in the topic.
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,

    /// Cumulative attempt counter.
    #[serde(default)]
    pub questions_answered: u32,

    /// Cumulative counter of attempts scoring above the pass threshold.
    #[serde(default)]
    pub correct_answers: u32,

    /// Per-module progress, keyed by module ID.
    #[serde(default)]
    pub modules: HashMap<String, ModuleProgress>,

    /// Parallel array of completed module IDs, kept for simpler
    /// consumers. Every writer must keep this bidirectionally
    /// consistent with `modules[*].completed`.
    #[serde(default)]
    pub completed_modules: Vec<String>,
}

/// Progress within one module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModuleProgress {
    /// Monotonic: false → true only, never reverts.
    #[serde(default)]
    pub completed: bool,

    /// Best score seen across attempts, in [0, 1].
    #[serde(default)]
    pub score: f64,

    /// Most recent attempt; drives the "completed today" check.
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Fresh empty record for a user with no history.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            topics: HashMap::new(),
            streak: 0,
            last_completed_date: None,
            total_points: 0,
            applied_events: HashSet::new(),
            updated_at: String::new(),
        }
    }

    /// Validate the record shape at the boundary, before it reaches the
    /// merge engine. Rejects out-of-range scores, inconsistent counters,
    /// and violations of the completed-modules invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("user_id must not be empty".to_string());
        }

        for (topic_id, topic) in &self.topics {
            if !(0.0..=1.0).contains(&topic.score) {
                return Err(format!(
                    "topic '{}': score {} outside [0, 1]",
                    topic_id, topic.score
                ));
            }
            if topic.correct_answers > topic.questions_answered {
                return Err(format!(
                    "topic '{}': correct_answers {} exceeds questions_answered {}",
                    topic_id, topic.correct_answers, topic.questions_answered
                ));
            }

            for (module_id, module) in &topic.modules {
                if !(0.0..=1.0).contains(&module.score) {
                    return Err(format!(
                        "topic '{}' module '{}': score {} outside [0, 1]",
                        topic_id, module_id, module.score
                    ));
                }
            }

            // completed_modules and modules[*].completed must agree both ways
            for module_id in &topic.completed_modules {
                let completed = topic
                    .modules
                    .get(module_id)
                    .map(|m| m.completed)
                    .unwrap_or(false);
                if !completed {
                    return Err(format!(
                        "topic '{}': '{}' listed in completed_modules but not completed",
                        topic_id, module_id
                    ));
                }
            }
            for (module_id, module) in &topic.modules {
                if module.completed && !topic.completed_modules.contains(module_id) {
                    return Err(format!(
                        "topic '{}': completed module '{}' missing from completed_modules",
                        topic_id, module_id
                    ));
                }
            }
        }

        Ok(())
    }
}

impl TopicProgress {
    /// Whether the bidirectional completed-modules invariant holds.
    pub fn modules_consistent(&self) -> bool {
        let from_map: HashSet<&String> = self
            .modules
            .iter()
            .filter(|(_, m)| m.completed)
            .map(|(id, _)| id)
            .collect();
        let from_list: HashSet<&String> = self.completed_modules.iter().collect();
        from_map == from_list && from_list.len() == self.completed_modules.len()
    }
}
