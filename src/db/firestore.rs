// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, points/streak mirrors)
//! - Progress records (per-user learning progress)
//! - Transactional sync and module completion
//!
//! The store serializes read-modify-write sequences per user through
//! Firestore transactions: both sync and completion read the record,
//! compute, and write back, and those sequences must not interleave for
//! the same user. Completions and syncs for different users are fully
//! independent.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ProgressRecord, User};
use crate::services::completion::{apply_completion, CompletionEvent};
use crate::services::merge::merge;
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Cursor for leaderboard pagination (points desc, user_id asc tie-break).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardCursor {
    pub points: u32,
    pub user_id: String,
}

/// Transaction attempts before surfacing a contention failure.
const TXN_ATTEMPTS: u32 = 5;

async fn backoff(attempt: u32) {
    tokio::time::sleep(std::time::Duration::from_millis(25 * attempt as u64)).await;
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user profile by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Leaderboard page: users ordered by points descending with a stable
    /// user_id tie-break. `cursor` resumes strictly after a previous
    /// page's last entry, so pages stay complete even when many users
    /// share the same point total.
    pub async fn get_leaderboard_page(
        &self,
        limit: u32,
        cursor: Option<&LeaderboardCursor>,
    ) -> Result<Vec<User>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([
                ("points", firestore::FirestoreQueryDirection::Descending),
                ("user_id", firestore::FirestoreQueryDirection::Ascending),
            ])
            .limit(limit);

        // Compound cursor on the full order key (points, user_id): ties on
        // points continue on the user_id component
        let query = if let Some(cursor) = cursor {
            query.start_at(firestore::FirestoreQueryCursor::AfterValue(vec![
                (cursor.points as i64).into(),
                cursor.user_id.clone().into(),
            ]))
        } else {
            query
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Progress Operations ─────────────────────────────────────

    /// Get a user's stored progress record.
    pub async fn get_progress(&self, user_id: &str) -> Result<Option<ProgressRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LEARNING_PROGRESS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a progress record (full overwrite).
    pub async fn set_progress(&self, record: &ProgressRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::LEARNING_PROGRESS)
            .document_id(&record.user_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Transactional Progress Writes ───────────────────────────

    /// Atomically sync a client record: read the server record, merge,
    /// write the merged record and the user-profile points/streak mirror.
    ///
    /// Both reads carry the transaction consistency selector, so if
    /// another request writes either document between our read and
    /// commit, Firestore rejects the commit instead of losing an update.
    /// Rejected attempts are retried with fresh reads, up to
    /// `TXN_ATTEMPTS` times.
    ///
    /// Returns the merged record.
    pub async fn sync_progress_atomic(
        &self,
        user_id: &str,
        client_record: &ProgressRecord,
    ) -> Result<ProgressRecord, AppError> {
        // Fail fast in offline mode rather than retrying a missing client
        self.get_client()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sync_progress_once(user_id, client_record).await {
                Err(AppError::Database(reason)) if attempt < TXN_ATTEMPTS => {
                    tracing::warn!(user_id, attempt, %reason, "Sync transaction retry");
                    backoff(attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn sync_progress_once(
        &self,
        user_id: &str,
        client_record: &ProgressRecord,
    ) -> Result<ProgressRecord, AppError> {
        let now = chrono::Utc::now();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let tx_consistency = firestore::FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        );

        // Read current server record inside the transaction's read set so
        // the commit fails if another writer touched it; absent means
        // first sync, start from an empty record rather than erroring
        let server_record: Option<ProgressRecord> = self
            .get_client()?
            .clone_with_consistency_selector(tx_consistency.clone())
            .fluent()
            .select()
            .by_id_in(collections::LEARNING_PROGRESS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read progress in transaction: {}", e))
            })?;
        let server_record = server_record.unwrap_or_else(|| ProgressRecord::empty(user_id));

        let merged = merge(&server_record, client_record, now)?;

        // Progress write plus the matching profile mirror write: every
        // points/streak change must reach the user document in the same
        // commit
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::LEARNING_PROGRESS)
            .document_id(&merged.user_id)
            .object(&merged)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add progress to transaction: {}", e))
            })?;

        let mirror = self.profile_mirror(&merged, now, &tx_consistency).await?;
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&mirror.user_id)
            .object(&mirror)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile mirror to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user_id,
            points = merged.total_points,
            streak = merged.streak,
            topics = merged.topics.len(),
            "Progress synced"
        );

        Ok(merged)
    }

    /// Atomically apply a module completion: read the record, apply the
    /// event, write the record and the profile mirror. Conflicting
    /// commits are retried like [`Self::sync_progress_atomic`].
    ///
    /// Returns the updated record and whether the event was newly applied
    /// (`false` for an idempotent duplicate event_id).
    pub async fn complete_module_atomic(
        &self,
        user_id: &str,
        event: &CompletionEvent,
    ) -> Result<(ProgressRecord, bool), AppError> {
        self.get_client()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.complete_module_once(user_id, event).await {
                Err(AppError::Database(reason)) if attempt < TXN_ATTEMPTS => {
                    tracing::warn!(user_id, attempt, %reason, "Completion transaction retry");
                    backoff(attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn complete_module_once(
        &self,
        user_id: &str,
        event: &CompletionEvent,
    ) -> Result<(ProgressRecord, bool), AppError> {
        let now = chrono::Utc::now();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let tx_consistency = firestore::FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        );

        let record: Option<ProgressRecord> = self
            .get_client()?
            .clone_with_consistency_selector(tx_consistency.clone())
            .fluent()
            .select()
            .by_id_in(collections::LEARNING_PROGRESS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read progress in transaction: {}", e))
            })?;
        let mut record = record.unwrap_or_else(|| ProgressRecord::empty(user_id));

        let applied = apply_completion(&mut record, event, now);
        if !applied {
            tracing::debug!(
                user_id,
                topic_id = %event.topic_id,
                module_id = %event.module_id,
                "Completion event already applied (idempotent skip)"
            );
            let _ = transaction.rollback().await;
            return Ok((record, false));
        }

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::LEARNING_PROGRESS)
            .document_id(&record.user_id)
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add progress to transaction: {}", e))
            })?;

        let mirror = self.profile_mirror(&record, now, &tx_consistency).await?;
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&mirror.user_id)
            .object(&mirror)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile mirror to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user_id,
            topic_id = %event.topic_id,
            module_id = %event.module_id,
            points = record.total_points,
            streak = record.streak,
            "Module completion recorded"
        );

        Ok((record, true))
    }

    /// Build the user-profile document mirroring the record's points and
    /// streak, creating a minimal profile on first contact. The profile
    /// read joins the caller's transaction read set.
    async fn profile_mirror(
        &self,
        record: &ProgressRecord,
        now: chrono::DateTime<chrono::Utc>,
        consistency: &firestore::FirestoreConsistencySelector,
    ) -> Result<User, AppError> {
        let now_str = format_utc_rfc3339(now);
        let existing: Option<User> = self
            .get_client()?
            .clone_with_consistency_selector(consistency.clone())
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&record.user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut user = existing.unwrap_or_else(|| User::new(&record.user_id, &now_str));
        user.points = record.total_points;
        user.streak = record.streak;
        user.last_active = now_str;
        Ok(user)
    }

    // ─── User Data Deletion ──────────────────────────────────────

    /// Delete ALL data for a user (account deletion).
    ///
    /// Removes `learning_progress/{user_id}` and `users/{user_id}`.
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::LEARNING_PROGRESS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        deleted_count += 1;
        tracing::debug!(user_id, "Deleted progress record");

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        deleted_count += 1;
        tracing::debug!(user_id, "Deleted user profile");

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
