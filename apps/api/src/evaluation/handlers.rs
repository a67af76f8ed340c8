use std::future::Future;

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::evaluation::persistence::save_report_logged;
use crate::evaluation::pipeline::{run_evaluation, EvaluateResponse, EvaluationInputs};
use crate::evaluation::skills::SkillsHolisticAssessor;
use crate::models::candidate::{CandidateContext, SkillArea};
use crate::models::evaluation::SkillsAssessment;
use crate::models::transcript::{QuestionGroupSet, Transcript};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub transcript: Transcript,
    pub question_groups: QuestionGroupSet,
    /// Falls back to `transcript.variables` when absent.
    #[serde(default)]
    pub resume: Option<CandidateContext>,
    #[serde(default)]
    pub key_skill_areas: Vec<SkillArea>,
    /// Names the saved report file.
    #[serde(default)]
    pub call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkillsAssessmentRequest {
    pub transcript: Transcript,
    #[serde(default)]
    pub resume: Option<CandidateContext>,
    #[serde(default)]
    pub key_skill_areas: Vec<SkillArea>,
}

/// POST /api/v1/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    if req.transcript.messages.is_empty() {
        return Err(AppError::Validation("Transcript contains no messages".to_string()));
    }

    let context = req
        .resume
        .unwrap_or_else(|| req.transcript.candidate_context());
    info!(
        "Evaluation requested: {} question groups, {} key skill areas",
        req.question_groups.groups.len(),
        req.key_skill_areas.len()
    );

    let inputs = EvaluationInputs {
        transcript: req.transcript,
        question_groups: req.question_groups,
        context,
        key_skill_areas: req.key_skill_areas,
    };
    let response = with_deadline(
        &state,
        run_evaluation(inputs, state.llm.clone(), state.prompts.clone()),
    )
    .await?;

    if state.config.save_reports {
        save_report_logged(&state.config.output_dir, req.call_id.as_deref(), &response).await;
    }

    Ok(Json(response))
}

/// POST /api/v1/skills-assessment
pub async fn handle_skills_assessment(
    State(state): State<AppState>,
    Json(req): Json<SkillsAssessmentRequest>,
) -> Result<Json<SkillsAssessment>, AppError> {
    if req.key_skill_areas.is_empty() {
        return Err(AppError::Validation(
            "At least one key skill area is required".to_string(),
        ));
    }

    let context = req
        .resume
        .unwrap_or_else(|| req.transcript.candidate_context());
    let turns = req.transcript.indexed_turns();
    let assessor = SkillsHolisticAssessor::new(state.llm.clone(), state.prompts.clone());

    let assessment = with_deadline(
        &state,
        assessor.assess(&turns, &req.key_skill_areas, &context),
    )
    .await?;

    // Transport failure. Parse failures still come back as an empty assessment.
    if let Some(error) = &assessment.error {
        return Err(AppError::Llm(error.clone()));
    }
    Ok(Json(assessment))
}

/// Bounds any LLM-backed request by `EVALUATION_TIMEOUT_SECS`.
pub async fn with_deadline<T>(state: &AppState, work: impl Future<Output = T>) -> Result<T, AppError> {
    let limit = state.config.evaluation_timeout;
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| AppError::Timeout(limit))
}
