// SPDX-License-Identifier: MIT

//! Progress orchestration service.
//!
//! Coordinates the sync and completion workflows:
//! 1. Validate the incoming record/event at the boundary
//! 2. Run the pure merge/completion inside the store's transaction
//! 3. Return the updated record so the client can replace its cache
//!
//! All cross-cutting writes (the user-profile points/streak mirror) are
//! handled inside the single transactional call, so one idempotent call
//! covers one event.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::ProgressRecord;
use crate::services::completion::CompletionEvent;

/// Orchestrates progress reads, syncs, and completions.
#[derive(Clone)]
pub struct ProgressService {
    db: FirestoreDb,
}

impl ProgressService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Current stored record; a user with no history gets an empty one.
    pub async fn get(&self, user_id: &str) -> Result<ProgressRecord> {
        Ok(self
            .db
            .get_progress(user_id)
            .await?
            .unwrap_or_else(|| ProgressRecord::empty(user_id)))
    }

    /// Reconcile a client-held record with the server copy.
    ///
    /// Validation failures and user mismatch surface immediately (caller
    /// bug, no retry); store failures surface as `Database` for the
    /// caller to retry with backoff.
    pub async fn sync(&self, user_id: &str, client_record: &ProgressRecord) -> Result<ProgressRecord> {
        if client_record.user_id != user_id {
            return Err(AppError::UserMismatch(format!(
                "record belongs to '{}', authenticated as '{}'",
                client_record.user_id, user_id
            )));
        }
        client_record.validate().map_err(AppError::Validation)?;

        self.db.sync_progress_atomic(user_id, client_record).await
    }

    /// Apply a single module completion event.
    ///
    /// Returns the updated record and whether the event was newly applied
    /// (`false` when a known `event_id` made it an idempotent duplicate).
    pub async fn complete_module(
        &self,
        user_id: &str,
        event: CompletionEvent,
    ) -> Result<(ProgressRecord, bool)> {
        if event.topic_id.is_empty() || event.module_id.is_empty() {
            return Err(AppError::Validation(
                "topic_id and module_id must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&event.score) {
            return Err(AppError::Validation(format!(
                "score {} outside [0, 1]",
                event.score
            )));
        }

        self.db.complete_module_atomic(user_id, &event).await
    }
}
