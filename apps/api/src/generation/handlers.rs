use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::evaluation::handlers::with_deadline;
use crate::generation::questions::{GenerationMetadata, QuestionGenerationResponse, QuestionGenerator};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionGenerationRequest {
    pub job_description: String,
    #[serde(default)]
    pub skills: Vec<Value>,
}

/// POST /api/v1/generate-questions
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    Json(req): Json<QuestionGenerationRequest>,
) -> Result<Json<QuestionGenerationResponse>, AppError> {
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation("Job description is required".to_string()));
    }
    if req.skills.is_empty() {
        return Err(AppError::Validation("At least one skill area is required".to_string()));
    }

    let generator = QuestionGenerator::new(state.llm.clone(), state.prompts.clone());
    let questions = with_deadline(&state, generator.generate(&req.job_description, &req.skills)).await??;

    let metadata = GenerationMetadata {
        generated_at: Utc::now(),
        model_used: state.config.llm.model.clone(),
        total_questions: questions.len(),
        skill_areas_processed: req.skills.len(),
    };
    Ok(Json(QuestionGenerationResponse { questions, metadata }))
}
