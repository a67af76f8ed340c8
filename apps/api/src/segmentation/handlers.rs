use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::evaluation::handlers::with_deadline;
use crate::evaluation::persistence::save_report_logged;
use crate::evaluation::pipeline::{run_evaluation, EvaluateResponse, EvaluationInputs};
use crate::models::candidate::{CandidateContext, SkillArea};
use crate::models::transcript::{QuestionGroupSet, Transcript};
use crate::segmentation::questions::{parse_technical_questions, prepare_known_questions, TechnicalQuestion};
use crate::segmentation::segmenter::QuestionSegmenter;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SegmentRequest {
    pub transcript: Transcript,
    /// Interviewer question sheet with `Q<n>:` markers. May be empty.
    #[serde(default)]
    pub technical_questions: String,
    #[serde(default)]
    pub key_skill_areas: Vec<SkillArea>,
}

/// Together with the transcript, a ready-made `/api/v1/evaluate` request.
#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    pub questions: Vec<TechnicalQuestion>,
    pub question_groups: QuestionGroupSet,
    pub key_skill_areas: Vec<SkillArea>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub transcript: Transcript,
    #[serde(default)]
    pub technical_questions: String,
    #[serde(default)]
    pub resume: Option<CandidateContext>,
    #[serde(default)]
    pub key_skill_areas: Vec<SkillArea>,
    #[serde(default)]
    pub call_id: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/segment
pub async fn handle_segment(
    State(state): State<AppState>,
    Json(req): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, AppError> {
    require_messages(&req.transcript)?;

    let questions = parse_technical_questions(&req.technical_questions);
    let known = prepare_known_questions(&questions);
    let turns = req.transcript.indexed_turns();
    info!(
        "Segmentation requested: {} turns, {} technical questions",
        turns.len(),
        questions.len()
    );

    let segmenter = QuestionSegmenter::new(state.llm.clone(), state.prompts.clone());
    let question_groups = with_deadline(&state, segmenter.segment(&turns, &known)).await??;

    Ok(Json(SegmentResponse {
        questions,
        question_groups,
        key_skill_areas: req.key_skill_areas,
    }))
}

/// POST /api/v1/generate-report
///
/// Segmentation followed by evaluation, under one deadline.
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(req): Json<GenerateReportRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    require_messages(&req.transcript)?;

    let known = prepare_known_questions(&parse_technical_questions(&req.technical_questions));
    let context = req
        .resume
        .unwrap_or_else(|| req.transcript.candidate_context());
    let segmenter = QuestionSegmenter::new(state.llm.clone(), state.prompts.clone());
    let transcript = req.transcript;
    let key_skill_areas = req.key_skill_areas;

    let work = async {
        let question_groups = segmenter.segment(&transcript.indexed_turns(), &known).await?;
        info!(
            "Segmented into {} groups, starting evaluation",
            question_groups.groups.len()
        );
        let inputs = EvaluationInputs {
            transcript,
            question_groups,
            context,
            key_skill_areas,
        };
        Ok::<_, AppError>(run_evaluation(inputs, state.llm.clone(), state.prompts.clone()).await)
    };
    let response = with_deadline(&state, work).await??;

    if state.config.save_reports {
        save_report_logged(&state.config.output_dir, req.call_id.as_deref(), &response).await;
    }

    Ok(Json(response))
}

fn require_messages(transcript: &Transcript) -> Result<(), AppError> {
    if transcript.messages.is_empty() {
        return Err(AppError::Validation("Transcript contains no messages".to_string()));
    }
    Ok(())
}
