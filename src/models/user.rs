// SPDX-License-Identifier: MIT

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
///
/// `points` and `streak` mirror the user's `ProgressRecord`; every
/// progress write carries a matching profile write so dashboard and
/// leaderboard reads stay a single document fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque user ID from the auth provider (also used as document ID)
    pub user_id: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Display name shown on leaderboards
    pub display_name: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Mirrored lifetime points from the progress record
    #[serde(default)]
    pub points: u32,
    /// Mirrored streak from the progress record
    #[serde(default)]
    pub streak: u32,
    /// When the user first signed up (ISO 8601)
    pub created_at: String,
    /// Last activity timestamp (ISO 8601)
    pub last_active: String,
}

impl User {
    /// Minimal profile created on first contact with an unknown user.
    pub fn new(user_id: &str, now: &str) -> Self {
        let short_id: String = user_id.chars().take(6).collect();
        Self {
            user_id: user_id.to_string(),
            email: None,
            display_name: format!("Learner {}", short_id),
            avatar_url: None,
            points: 0,
            streak: 0,
            created_at: now.to_string(),
            last_active: now.to_string(),
        }
    }
}
