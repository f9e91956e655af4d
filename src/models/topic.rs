// SPDX-License-Identifier: MIT

//! Read-only topic catalog shapes.
//!
//! The catalog is loaded from a JSON file at startup and never mutated by
//! the core; declaration order in the file is the stable order used by
//! the recommended-topic selector.

use serde::{Deserialize, Serialize};

/// A learning topic in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Stable topic ID (e.g. "budgeting-basics")
    pub id: String,
    /// Display title
    pub title: String,
    /// Short description shown in the topic list
    #[serde(default)]
    pub description: String,
    /// Points required before this topic unlocks
    #[serde(default)]
    pub required_points: u32,
    /// Modules in presentation order
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
}

/// A module within a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Stable module ID (e.g. "budgeting-basics-1")
    pub id: String,
    /// Display title
    pub title: String,
    /// Lesson body shown to the learner
    #[serde(default)]
    pub content: String,
    /// Key points the quiz generator builds questions from
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Difficulty label ("beginner", "intermediate", "advanced")
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

fn default_difficulty() -> String {
    "beginner".to_string()
}
