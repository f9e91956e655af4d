// SPDX-License-Identifier: MIT

//! Topic catalog and quiz-content routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::generation::{FeedbackRequest, QuestionRequest, QuizQuestion};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/topics", get(get_topics))
        .route("/api/topics/recommended", get(get_recommended_topic))
        .route("/api/learn/questions", post(generate_questions))
        .route("/api/learn/feedback", post(generate_feedback))
}

// ─── Topic Catalog ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopicSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub required_points: u32,
    pub module_count: u32,
    /// Whether the user's current points unlock this topic
    pub unlocked: bool,
}

/// List the topic catalog, annotated with unlock state for the user.
async fn get_topics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<TopicSummary>>> {
    let points = state
        .db
        .get_user(&user.user_id)
        .await?
        .map(|u| u.points)
        .unwrap_or(0);

    let topics = state
        .catalog_service
        .topics()
        .iter()
        .map(|t| TopicSummary {
            id: t.id.clone(),
            title: t.title.clone(),
            description: t.description.clone(),
            required_points: t.required_points,
            module_count: t.modules.len() as u32,
            unlocked: t.required_points <= points,
        })
        .collect();

    Ok(Json(topics))
}

#[derive(Deserialize)]
struct RecommendedQuery {
    /// Comma-separated preferred topic IDs
    preferred: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecommendedTopicResponse {
    pub topic: Option<TopicSummary>,
}

/// Today's recommended topic: deterministic date-seeded pick, stable for
/// the whole calendar day.
async fn get_recommended_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RecommendedQuery>,
) -> Result<Json<RecommendedTopicResponse>> {
    let points = state
        .db
        .get_user(&user.user_id)
        .await?
        .map(|u| u.points)
        .unwrap_or(0);

    let preferred: HashSet<String> = params
        .preferred
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_string())
        .collect();

    let topic = state
        .catalog_service
        .recommend_topic(&preferred, points, chrono::Utc::now())
        .map(|t| TopicSummary {
            id: t.id.clone(),
            title: t.title.clone(),
            description: t.description.clone(),
            required_points: t.required_points,
            module_count: t.modules.len() as u32,
            unlocked: t.required_points <= points,
        });

    Ok(Json(RecommendedTopicResponse { topic }))
}

// ─── Quiz Content ────────────────────────────────────────────

#[derive(Deserialize)]
struct QuestionsRequestBody {
    topic_id: String,
    module_id: String,
    #[serde(default)]
    learning_style: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct QuestionsResponse {
    pub questions: Vec<QuizQuestion>,
}

/// Generate quiz questions for a module.
///
/// Never fails on generation problems: fallback content is served in
/// their place and looks like normal content to the caller.
async fn generate_questions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<QuestionsRequestBody>,
) -> Result<Json<QuestionsResponse>> {
    let module = state
        .catalog_service
        .module(&body.topic_id, &body.module_id)
        .ok_or_else(|| {
            crate::error::AppError::NotFound(format!(
                "Module {}/{} not in catalog",
                body.topic_id, body.module_id
            ))
        })?;

    tracing::debug!(
        user_id = %user.user_id,
        module_id = %module.id,
        "Generating quiz questions"
    );

    let request = QuestionRequest {
        module_title: module.title.clone(),
        module_content: module.content.clone(),
        key_points: module.key_points.clone(),
        difficulty: module.difficulty.clone(),
        learning_style: body.learning_style.unwrap_or_else(|| "balanced".to_string()),
    };

    let questions = state
        .generation_service
        .generate_questions(&module.id, &request)
        .await;

    Ok(Json(QuestionsResponse { questions }))
}

#[derive(Deserialize)]
struct FeedbackRequestBody {
    topic_id: String,
    module_id: String,
    score: u32,
    total_questions: u32,
    #[serde(default)]
    learning_style: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FeedbackResponse {
    pub feedback: String,
}

/// Generate post-quiz feedback text.
async fn generate_feedback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<FeedbackRequestBody>,
) -> Result<Json<FeedbackResponse>> {
    let module = state
        .catalog_service
        .module(&body.topic_id, &body.module_id)
        .ok_or_else(|| {
            crate::error::AppError::NotFound(format!(
                "Module {}/{} not in catalog",
                body.topic_id, body.module_id
            ))
        })?;

    tracing::debug!(
        user_id = %user.user_id,
        module_id = %module.id,
        score = body.score,
        "Generating feedback"
    );

    let request = FeedbackRequest {
        module_title: module.title.clone(),
        score: body.score,
        total_questions: body.total_questions,
        key_points: module.key_points.clone(),
        learning_style: body.learning_style.unwrap_or_else(|| "balanced".to_string()),
    };

    let feedback = state.generation_service.generate_feedback(&request).await;

    Ok(Json(FeedbackResponse { feedback }))
}
