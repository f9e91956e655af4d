// SPDX-License-Identifier: MIT

//! Quiz question and feedback generation.
//!
//! Wraps the external text-generation service. Generation is strictly
//! best-effort: any failure (network, non-2xx, unparseable body) is
//! logged and replaced with deterministic fallback content built from
//! the module's key points. A generation failure must never block the
//! completion flow or surface to the user as an error.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 20;
const OPTIONS_PER_QUESTION: usize = 4;

/// A generated quiz question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct QuizQuestion {
    pub question: String,
    /// Exactly four options
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_answer: u8,
    pub explanation: String,
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practical_example: Option<String>,
}

/// Inputs for question generation.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRequest {
    pub module_title: String,
    pub module_content: String,
    pub key_points: Vec<String>,
    pub difficulty: String,
    pub learning_style: String,
}

/// Inputs for feedback generation.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub module_title: String,
    pub score: u32,
    pub total_questions: u32,
    pub key_points: Vec<String>,
    pub learning_style: String,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
struct FeedbackResponse {
    feedback: String,
}

/// Client for the generation service with a per-module response cache.
#[derive(Clone)]
pub struct GenerationService {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    // Cache survives for the process lifetime; keyed by (module, difficulty)
    question_cache: Arc<DashMap<(String, String), Vec<QuizQuestion>>>,
}

impl GenerationService {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            question_cache: Arc::new(DashMap::new()),
        }
    }

    /// Generate quiz questions for a module.
    ///
    /// Always returns a usable question set; remote failures fall back to
    /// deterministic questions built from the key points.
    pub async fn generate_questions(
        &self,
        module_id: &str,
        request: &QuestionRequest,
    ) -> Vec<QuizQuestion> {
        let cache_key = (module_id.to_string(), request.difficulty.clone());
        if let Some(cached) = self.question_cache.get(&cache_key) {
            return cached.clone();
        }

        match self.fetch_questions(request).await {
            Ok(questions) if !questions.is_empty() => {
                self.question_cache.insert(cache_key, questions.clone());
                questions
            }
            Ok(_) => {
                tracing::warn!(module_id, "Generation service returned no questions, using fallback");
                fallback_questions(request)
            }
            Err(err) => {
                tracing::warn!(module_id, error = %err, "Question generation failed, using fallback");
                fallback_questions(request)
            }
        }
    }

    /// Generate post-quiz feedback text.
    pub async fn generate_feedback(&self, request: &FeedbackRequest) -> String {
        match self.fetch_feedback(request).await {
            Ok(feedback) if !feedback.trim().is_empty() => feedback,
            Ok(_) => fallback_feedback(request),
            Err(err) => {
                tracing::warn!(
                    module_title = %request.module_title,
                    error = %err,
                    "Feedback generation failed, using fallback"
                );
                fallback_feedback(request)
            }
        }
    }

    async fn fetch_questions(&self, request: &QuestionRequest) -> anyhow::Result<Vec<QuizQuestion>> {
        if self.base_url.is_empty() {
            anyhow::bail!("generation service not configured");
        }

        let response = self
            .http
            .post(format!("{}/v1/questions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<QuestionsResponse>()
            .await?;

        // Discard malformed questions instead of failing the whole set
        let questions: Vec<QuizQuestion> = response
            .questions
            .into_iter()
            .filter(|q| {
                q.options.len() == OPTIONS_PER_QUESTION
                    && (q.correct_answer as usize) < q.options.len()
            })
            .collect();

        Ok(questions)
    }

    async fn fetch_feedback(&self, request: &FeedbackRequest) -> anyhow::Result<String> {
        if self.base_url.is_empty() {
            anyhow::bail!("generation service not configured");
        }

        let response = self
            .http
            .post(format!("{}/v1/feedback", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<FeedbackResponse>()
            .await?;

        Ok(response.feedback)
    }
}

/// Deterministic fallback questions built from the module's key points.
///
/// Indistinguishable from normal content at the API surface; one question
/// per key point, the first option is always the key point itself.
fn fallback_questions(request: &QuestionRequest) -> Vec<QuizQuestion> {
    let distractors = [
        "This is not covered in this module",
        "The opposite is generally true",
        "Only in rare circumstances",
    ];

    let key_points: &[String] = if request.key_points.is_empty() {
        std::slice::from_ref(&request.module_title)
    } else {
        &request.key_points
    };

    key_points
        .iter()
        .map(|point| {
            let mut options = vec![point.clone()];
            options.extend(distractors.iter().map(|d| d.to_string()));
            QuizQuestion {
                question: format!(
                    "Which of the following is a key idea from \"{}\"?",
                    request.module_title
                ),
                options,
                correct_answer: 0,
                explanation: format!("This module covered: {}", point),
                difficulty: request.difficulty.clone(),
                visual_content: None,
                practical_example: None,
            }
        })
        .collect()
}

/// Templated feedback by score band.
fn fallback_feedback(request: &FeedbackRequest) -> String {
    let total = request.total_questions.max(1);
    let ratio = request.score as f64 / total as f64;

    let opening = if ratio >= 0.9 {
        "Excellent work"
    } else if ratio >= 0.7 {
        "Good job"
    } else if ratio >= 0.5 {
        "Nice effort"
    } else {
        "Keep practicing"
    };

    let mut feedback = format!(
        "{}! You scored {}/{} on \"{}\".",
        opening, request.score, total, request.module_title
    );
    if ratio < 0.7 {
        if let Some(point) = request.key_points.first() {
            feedback.push_str(&format!(" A good place to review: {}.", point));
        }
    }
    feedback
}
