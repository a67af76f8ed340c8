//! Question group evaluation: one LLM call per group, normalized into an
//! `EvaluationRecord`.
//!
//! Never returns an error. A transport failure becomes a `Failed` outcome, an
//! unparseable response becomes the parsing fallback, and every outcome carries
//! the group's metadata.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::evaluation::prompts::{populate_template, PromptSet, GROUP_EVALUATION_PREFIX};
use crate::llm_client::{ChatMessage, LlmProvider};
use crate::models::candidate::{CandidateContext, SkillArea};
use crate::models::evaluation::{EvaluationRecord, GroupOutcome};
use crate::models::transcript::QuestionGroup;
use crate::parsing::structured::{parse_typed, ParseError, ParseStrategy};

#[derive(Clone)]
pub struct QuestionGroupEvaluator {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
}

impl QuestionGroupEvaluator {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    pub async fn evaluate(&self, group: &QuestionGroup, context: &CandidateContext) -> GroupOutcome {
        let metadata = group.metadata();
        info!("Evaluating question group {}", group.question_id);

        let messages = match self.build_messages(group, context) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Could not build prompt for group {}: {e}", group.question_id);
                return GroupOutcome::failed(format!("Failed to evaluate group: {e}"), metadata);
            }
        };

        let response = match self
            .llm
            .generate(&messages, Some(&self.prompts.evaluation_schema))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("LLM call failed for group {}: {e}", group.question_id);
                return GroupOutcome::failed(format!("Failed to evaluate group: {e}"), metadata);
            }
        };

        info!(
            "Response for group {}: {} chars",
            group.question_id,
            response.len()
        );

        match parse_evaluation(&response) {
            Ok((mut record, strategy)) => {
                if strategy != ParseStrategy::Direct {
                    info!(
                        "Evaluation for group {} recovered via {:?} parse",
                        group.question_id, strategy
                    );
                }
                for qa in record
                    .question_analysis
                    .iter_mut()
                    .filter(|qa| qa.conversation.is_empty())
                {
                    qa.conversation = group.conversation.clone();
                }
                record.group_metadata = metadata;
                record.parsing_error = false;
                record.raw_response_preview = None;
                GroupOutcome::Evaluated(record)
            }
            Err(e) => {
                warn!(
                    "Failed to parse evaluation for group {}: {e}",
                    group.question_id
                );
                GroupOutcome::Evaluated(EvaluationRecord::parsing_fallback(&response, metadata))
            }
        }
    }

    /// System role carries the candidate context; user role carries the group
    /// and its derived conversation.
    fn build_messages(
        &self,
        group: &QuestionGroup,
        context: &CandidateContext,
    ) -> serde_json::Result<Vec<ChatMessage>> {
        let system = populate_template::<SkillArea>(&self.prompts.evaluation_prompt, context, &[])?;
        let input = json!({
            "question_group": group,
            "transcript_messages": group.conversation,
        });
        let user = format!("{GROUP_EVALUATION_PREFIX}{}", serde_json::to_string(&input)?);
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

/// Parses a raw response into a validated record. Required keys are enforced on
/// the final object, so a repaired-but-incomplete response is a failure.
pub fn parse_evaluation(raw: &str) -> Result<(EvaluationRecord, ParseStrategy), ParseError> {
    let (record, strategy) =
        parse_typed::<EvaluationRecord>(raw, &EvaluationRecord::REQUIRED_KEYS)?;
    record.validate().map_err(ParseError::Contract)?;
    Ok((record, strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Reply, ScriptedLlm};
    use crate::llm_client::ChatRole;
    use crate::models::evaluation::{Recommendation, PARSE_FAILURE_SUMMARY};
    use serde_json::{json, Value};
    use std::collections::BTreeSet;

    fn prompts() -> Arc<PromptSet> {
        Arc::new(PromptSet {
            evaluation_prompt: "Candidate: {{RESUME_CONTENT}}\nRole: {{JOB_REQUIREMENTS}}\nSkills: {{KEY_SKILL_AREAS}}".to_string(),
            evaluation_schema: json!({"type": "object"}),
            skills_prompt: String::new(),
            skills_schema: json!({"type": "object"}),
            ..PromptSet::default()
        })
    }

    fn group(id: &str) -> QuestionGroup {
        serde_json::from_value(json!({
            "question_id": id,
            "question_title": "Event loop",
            "type": "technical",
            "time_range": {"start": 10.0, "end": 55.0},
            "turn_indices": [0, 1],
            "conversation": [
                {"idx": 0, "role": "agent", "message": "How does the event loop work?"},
                {"idx": 1, "role": "user", "message": "Callbacks are queued and drained."}
            ]
        }))
        .unwrap()
    }

    fn context() -> CandidateContext {
        CandidateContext {
            candidate_name: Some("Jane Doe".to_string()),
            job_requirements: Some("Senior Node.js".to_string()),
            ..CandidateContext::default()
        }
    }

    fn success_response(score: u32) -> String {
        json!({
            "overall_assessment": {
                "recommendation": "Hire",
                "confidence": "Medium",
                "overall_score": score,
                "summary": "Clear explanation"
            },
            "competency_mapping": [],
            "question_analysis": [{
                "question_id": "Q1",
                "question_text": "How does the event loop work?",
                "answer_quality": {"relevance_score": score, "completeness": "Partial", "clarity": "Good", "depth": "Moderate", "evidence_provided": true},
                "strengths": ["Knows the queue model"]
            }],
            "critical_analysis": {"problem_solving_approach": "Methodical"},
            "improvement_recommendations": ["Study libuv phases"]
        })
        .to_string()
    }

    fn evaluator(llm: ScriptedLlm) -> (QuestionGroupEvaluator, Arc<ScriptedLlm>) {
        let llm = Arc::new(llm);
        (QuestionGroupEvaluator::new(llm.clone(), prompts()), llm)
    }

    #[tokio::test]
    async fn test_successful_response_becomes_record_with_metadata() {
        let (evaluator, _) = evaluator(ScriptedLlm::replying(success_response(72)));
        let outcome = evaluator.evaluate(&group("Q1"), &context()).await;

        let record = outcome.record().expect("evaluated");
        assert!(!record.parsing_error);
        assert_eq!(record.overall_assessment.overall_score, 72.0);
        assert_eq!(record.question_analysis.len(), 1);
        assert_eq!(record.group_metadata.question_id, "Q1");
        assert_eq!(record.group_metadata.group_type, "technical");
        assert!(record.group_metadata.time_range.is_some());
    }

    #[tokio::test]
    async fn test_question_analysis_carries_group_conversation() {
        let (evaluator, _) = evaluator(ScriptedLlm::replying(success_response(72)));
        let outcome = evaluator.evaluate(&group("Q1"), &context()).await;

        let qa = &outcome.record().unwrap().question_analysis[0];
        assert_eq!(qa.conversation.len(), 2);
        assert_eq!(qa.conversation[0].index, 0);
        assert_eq!(qa.conversation[1].message, "Callbacks are queued and drained.");
    }

    #[tokio::test]
    async fn test_prompt_shape_system_context_user_group() {
        let (evaluator, llm) = evaluator(ScriptedLlm::replying(success_response(60)));
        evaluator.evaluate(&group("Q1"), &context()).await;

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        let messages = &calls[0];
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("Jane Doe"));
        assert!(messages[0].content.contains("Role: Senior Node.js"));
        assert!(messages[0].content.contains("Skills: []"));

        assert_eq!(messages[1].role, ChatRole::User);
        let payload = messages[1]
            .content
            .strip_prefix(GROUP_EVALUATION_PREFIX)
            .unwrap();
        let payload: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(payload["question_group"]["question_id"], "Q1");
        assert_eq!(payload["transcript_messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_error_outcome() {
        let (evaluator, _) =
            evaluator(ScriptedLlm::new(Reply::ApiError("upstream overloaded".to_string())));
        let outcome = evaluator.evaluate(&group("Q3"), &context()).await;

        match outcome {
            GroupOutcome::Failed(failed) => {
                assert!(failed.error.starts_with("Failed to evaluate group:"));
                assert!(failed.error.contains("upstream overloaded"));
                assert_eq!(failed.group_metadata.question_id, "Q3");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_response_becomes_fallback() {
        let (evaluator, _) = evaluator(ScriptedLlm::replying("I cannot evaluate this."));
        let outcome = evaluator.evaluate(&group("Q2"), &context()).await;

        let record = outcome.record().expect("fallback is still a record");
        assert!(record.parsing_error);
        assert_eq!(record.overall_assessment.summary, PARSE_FAILURE_SUMMARY);
        assert_eq!(record.group_metadata.question_id, "Q2");
        assert_eq!(
            record.raw_response_preview.as_deref(),
            Some("I cannot evaluate this.")
        );
    }

    #[tokio::test]
    async fn test_truncated_mid_key_response_is_discarded_for_fallback() {
        let truncated = r#"{"overall_assessment": {"recommendation": "Hire", "confidence": "Medium", "overall_score": 65, "summary": "ok"}, "competency_map"#;
        let (evaluator, _) = evaluator(ScriptedLlm::replying(truncated));
        let outcome = evaluator.evaluate(&group("Q1"), &context()).await;

        let record = outcome.record().unwrap();
        assert!(record.parsing_error);
        assert_eq!(record.overall_assessment.overall_score, 0.0);
        assert_eq!(record.overall_assessment.recommendation, Recommendation::NoHire);
    }

    #[test]
    fn test_truncated_response_repairs_but_misses_required_keys() {
        let truncated = r#"{"overall_assessment": {"recommendation": "Hire", "confidence": "Medium", "overall_score": 65, "summary": "ok"}, "competency_map"#;
        match parse_evaluation(truncated) {
            Err(ParseError::MissingKeys { missing }) => {
                assert!(missing.contains(&"competency_mapping".to_string()));
                assert!(missing.contains(&"question_analysis".to_string()));
            }
            other => panic!("expected missing keys, got {other:?}"),
        }
    }

    #[test]
    fn test_fenced_response_parses() {
        let raw = format!("```json\n{}\n```", success_response(80));
        let (record, strategy) = parse_evaluation(&raw).unwrap();
        assert_eq!(strategy, ParseStrategy::Extracted);
        assert_eq!(record.overall_assessment.recommendation, Recommendation::Hire);
    }

    #[test]
    fn test_out_of_range_score_is_a_parse_failure() {
        let raw = success_response(180);
        assert!(matches!(parse_evaluation(&raw), Err(ParseError::Contract(_))));
    }

    #[tokio::test]
    async fn test_success_and_fallback_share_shape() {
        let (ok_eval, _) = evaluator(ScriptedLlm::replying(success_response(50)));
        let (bad_eval, _) = evaluator(ScriptedLlm::replying("nope"));

        let ok = serde_json::to_value(ok_eval.evaluate(&group("Q1"), &context()).await).unwrap();
        let bad = serde_json::to_value(bad_eval.evaluate(&group("Q1"), &context()).await).unwrap();

        let keys = |v: &Value| -> BTreeSet<String> { v.as_object().unwrap().keys().cloned().collect() };
        assert_eq!(keys(&ok), keys(&bad));
    }
}
