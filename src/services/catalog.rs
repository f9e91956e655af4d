// SPDX-License-Identifier: MIT

//! Topic catalog loading and the recommended-topic selector.

use crate::models::{ModuleRef, Topic};
use crate::time_utils::date_seed;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Service holding the read-only topic catalog.
///
/// Topics keep the declaration order of the catalog file; the
/// recommended-topic selector depends on that order being stable.
#[derive(Debug, Default, Clone)]
pub struct CatalogService {
    topics: Vec<Topic>,
}

impl CatalogService {
    /// Load the catalog from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::Io(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load the catalog from a JSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let topics: Vec<Topic> =
            serde_json::from_str(json_data).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut seen = HashSet::new();
        for topic in &topics {
            if !seen.insert(&topic.id) {
                return Err(CatalogError::DuplicateTopic(topic.id.clone()));
            }
        }

        Ok(Self { topics })
    }

    /// All topics in declaration order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Look up a topic by ID.
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// Look up a module within a topic.
    pub fn module(&self, topic_id: &str, module_id: &str) -> Option<&ModuleRef> {
        self.topic(topic_id)?.modules.iter().find(|m| m.id == module_id)
    }

    /// Deterministic, date-seeded topic of the day.
    ///
    /// All users with the same eligibility set see the same pick for a
    /// given calendar date, and a given user sees a stable pick
    /// throughout one day.
    ///
    /// Candidate selection:
    /// 1. topics with `required_points <= user_points` ("eligible")
    /// 2. narrowed to the user's preferred topics when that intersection
    ///    is non-empty
    /// 3. if nothing is eligible, the subset of all topics sharing the
    ///    minimal `required_points`, so a brand-new user always gets one
    ///
    /// Returns `None` only when the catalog itself is empty.
    pub fn recommend_topic(
        &self,
        preferred_topic_ids: &HashSet<String>,
        user_points: u32,
        today: DateTime<Utc>,
    ) -> Option<&Topic> {
        if self.topics.is_empty() {
            return None;
        }

        let eligible: Vec<&Topic> = self
            .topics
            .iter()
            .filter(|t| t.required_points <= user_points)
            .collect();

        let preferred: Vec<&Topic> = eligible
            .iter()
            .copied()
            .filter(|t| preferred_topic_ids.contains(&t.id))
            .collect();

        let candidates: Vec<&Topic> = if !preferred.is_empty() {
            preferred
        } else if !eligible.is_empty() {
            eligible
        } else {
            // Locked out of everything: fall back to the cheapest topics
            let min_required = self
                .topics
                .iter()
                .map(|t| t.required_points)
                .min()
                .unwrap_or(0);
            self.topics
                .iter()
                .filter(|t| t.required_points == min_required)
                .collect()
        };

        let seed = date_seed(today) as usize;
        Some(candidates[seed % candidates.len()])
    }
}

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(String),

    #[error("Failed to parse catalog JSON: {0}")]
    Parse(String),

    #[error("Duplicate topic id in catalog: {0}")]
    DuplicateTopic(String),
}
