// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::db::firestore::LeaderboardCursor;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::ProgressRecord;
use crate::services::completion::CompletionEvent;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/progress", get(get_progress))
        .route("/api/progress/sync", post(sync_progress))
        .route("/api/progress/module/complete", post(complete_module))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/account", delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub points: u32,
    pub streak: u32,
}

/// Get current user profile (with mirrored points/streak).
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state.db.get_user(&user.user_id).await?.ok_or_else(|| {
        crate::error::AppError::NotFound(format!("User {} not found", user.user_id))
    })?;

    Ok(Json(UserResponse {
        user_id: profile.user_id,
        display_name: profile.display_name,
        avatar_url: profile.avatar_url,
        points: profile.points,
        streak: profile.streak,
    }))
}

// ─── Progress ────────────────────────────────────────────────

/// Get the stored progress record for the authenticated user.
///
/// A user with no history gets an empty record, not a 404.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProgressRecord>> {
    let record = state.progress_service.get(&user.user_id).await?;
    Ok(Json(record))
}

/// Sync a client-held progress record against the server copy.
///
/// Body: the client's full ProgressRecord. Response: the merged record,
/// which the client should adopt as its new local cache.
async fn sync_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(client_record): Json<ProgressRecord>,
) -> Result<Json<ProgressRecord>> {
    tracing::debug!(
        user_id = %user.user_id,
        client_topics = client_record.topics.len(),
        client_points = client_record.total_points,
        "Sync requested"
    );

    let merged = state
        .progress_service
        .sync(&user.user_id, &client_record)
        .await?;

    Ok(Json(merged))
}

#[derive(Deserialize, Validate)]
struct CompleteModuleRequest {
    topic_id: String,
    module_id: String,
    /// Score in [0,1]; this path defaults to 1.0 when absent.
    #[validate(range(min = 0.0, max = 1.0))]
    score: Option<f64>,
    /// Optional idempotency key for the completion event.
    event_id: Option<String>,
}

/// Completion response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompleteModuleResponse {
    /// False when the event_id was already applied
    pub applied: bool,
    pub record: ProgressRecord,
}

/// Record a single module completion.
async fn complete_module(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CompleteModuleRequest>,
) -> Result<Json<CompleteModuleResponse>> {
    request
        .validate()
        .map_err(|e| crate::error::AppError::Validation(e.to_string()))?;

    let event = CompletionEvent {
        topic_id: request.topic_id,
        module_id: request.module_id,
        score: request.score.unwrap_or(1.0),
        event_id: request.event_id,
    };

    let (record, applied) = state
        .progress_service
        .complete_module(&user.user_id, event)
        .await?;

    Ok(Json(CompleteModuleResponse { applied, record }))
}

// ─── Leaderboard ─────────────────────────────────────────────

const DEFAULT_LEADERBOARD_LIMIT: u32 = 25;
const MAX_LEADERBOARD_LIMIT: u32 = 100;
const CURSOR_PARTS: usize = 2;

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
    /// Opaque cursor from a previous page.
    cursor: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub points: u32,
    pub streak: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<LeaderboardCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || crate::error::AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.splitn(CURSOR_PARTS, ':').collect();
            if parts.len() != CURSOR_PARTS || parts[1].is_empty() {
                return Err(invalid_cursor());
            }

            let points = parts[0].parse::<u32>().map_err(|_| invalid_cursor())?;

            Ok(LeaderboardCursor {
                points,
                user_id: parts[1].to_string(),
            })
        })
        .transpose()
}

fn encode_cursor(cursor: &LeaderboardCursor) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}:{}", cursor.points, cursor.user_id))
}

/// Leaderboard: users by points descending (a sorted projection over the
/// mirrored profile fields, one query, no progress reads).
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT)
        .max(1);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    tracing::debug!(user_id = %user.user_id, limit, "Fetching leaderboard");

    // Fetch one extra row to know whether another page exists; the store
    // resumes strictly after the cursor's (points, user_id) pair
    let fetch_limit = limit.saturating_add(1);
    let users = state.db.get_leaderboard_page(fetch_limit, cursor.as_ref()).await?;

    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .map(|u| LeaderboardEntry {
            user_id: u.user_id,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            points: u.points,
            streak: u.streak,
        })
        .collect();

    let has_more = entries.len() > limit as usize;
    if has_more {
        entries.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        entries.last().map(|e| {
            encode_cursor(&LeaderboardCursor {
                points: e.points,
                user_id: e.user_id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Json(LeaderboardResponse {
        entries,
        next_cursor,
    }))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub deleted_documents: usize,
}

/// Delete the user's account and all associated data.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    let deleted = state.db.delete_user_data(&user.user_id).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        deleted_documents: deleted,
    }))
}
