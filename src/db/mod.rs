// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Progress records (keyed by user_id)
    pub const LEARNING_PROGRESS: &str = "learning_progress";
}
