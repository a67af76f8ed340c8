//! Fan-out/fan-in evaluation pipeline.
//!
//! One spawned task per question group, gathered with `join_all` so results come
//! back in group order. The holistic skills assessment runs alongside the
//! fan-out. Merge only starts once every task has finished; dropping the
//! pipeline future aborts whatever is still in flight.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info};

use crate::evaluation::evaluator::QuestionGroupEvaluator;
use crate::evaluation::merger::merge_evaluations;
use crate::evaluation::prompts::PromptSet;
use crate::evaluation::skills::SkillsHolisticAssessor;
use crate::llm_client::LlmProvider;
use crate::models::candidate::{CandidateContext, SkillArea};
use crate::models::evaluation::{GroupOutcome, MergedReport, SkillsAssessment};
use crate::models::transcript::{build_conversations, QuestionGroup, QuestionGroupSet, Transcript};

pub struct EvaluationInputs {
    pub transcript: Transcript,
    pub question_groups: QuestionGroupSet,
    pub context: CandidateContext,
    pub key_skill_areas: Vec<SkillArea>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub evaluation_report: MergedReport,
    /// The input groups with their derived conversations filled in.
    pub question_groups: QuestionGroupSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_assessment: Option<SkillsAssessment>,
}

pub async fn run_evaluation(
    inputs: EvaluationInputs,
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
) -> EvaluateResponse {
    let EvaluationInputs {
        transcript,
        question_groups,
        context,
        key_skill_areas,
    } = inputs;

    let turns = transcript.indexed_turns();
    let groups = build_conversations(&question_groups.groups, &turns);
    info!(
        "Evaluating {} question groups over {} transcript turns",
        groups.len(),
        turns.len()
    );

    let evaluator = QuestionGroupEvaluator::new(llm.clone(), prompts.clone());
    let assessor = SkillsHolisticAssessor::new(llm, prompts);
    let context = Arc::new(context);

    let skills_pass = async {
        if key_skill_areas.is_empty() {
            info!("No key skill areas supplied, skipping holistic skills assessment");
            None
        } else {
            Some(assessor.assess(&turns, &key_skill_areas, &context).await)
        }
    };

    let (outcomes, skills_assessment) =
        tokio::join!(evaluate_groups(&evaluator, &groups, context.clone()), skills_pass);

    let evaluation_report = merge_evaluations(
        &outcomes,
        &question_groups.pre_inferred_facts_global,
        skills_assessment.as_ref(),
    );

    EvaluateResponse {
        evaluation_report,
        question_groups: QuestionGroupSet {
            groups,
            ..question_groups
        },
        skills_assessment,
    }
}

/// Runs every group concurrently and returns one outcome per group, in input
/// order. A task that panics or is aborted becomes a `Failed` outcome.
pub async fn evaluate_groups(
    evaluator: &QuestionGroupEvaluator,
    groups: &[QuestionGroup],
    context: Arc<CandidateContext>,
) -> Vec<GroupOutcome> {
    let mut guard = AbortOnDrop::default();

    let handles: Vec<JoinHandle<GroupOutcome>> = groups
        .iter()
        .cloned()
        .map(|group| {
            let evaluator = evaluator.clone();
            let context = context.clone();
            let handle = tokio::spawn(async move { evaluator.evaluate(&group, &context).await });
            guard.track(handle.abort_handle());
            handle
        })
        .collect();

    let results = join_all(handles).await;
    guard.disarm();

    results
        .into_iter()
        .zip(groups)
        .map(|(result, group)| match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Evaluation task for group {} did not complete: {e}", group.question_id);
                GroupOutcome::failed(format!("Failed to evaluate group: {e}"), group.metadata())
            }
        })
        .collect()
}

/// Aborts tracked tasks when dropped, unless disarmed first.
#[derive(Default)]
struct AbortOnDrop(Vec<AbortHandle>);

impl AbortOnDrop {
    fn track(&mut self, handle: AbortHandle) {
        self.0.push(handle);
    }

    fn disarm(&mut self) {
        self.0.clear();
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
