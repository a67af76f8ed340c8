//! Holistic skills assessment: a single LLM pass over the whole transcript.
//!
//! Skill evidence is usually scattered across several answers, so competency is
//! judged once against the full conversation instead of per group.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::evaluation::prompts::{populate_template, PromptSet, SKILLS_ASSESSMENT_PREFIX};
use crate::llm_client::{ChatMessage, LlmProvider};
use crate::models::candidate::{CandidateContext, SkillArea};
use crate::models::evaluation::{SkillsAssessment, FALLBACK_PREVIEW_CHARS};
use crate::models::transcript::ConversationTurn;
use crate::parsing::structured::{parse_typed, preview};

pub const SKILLS_PARSE_FAILURE: &str = "Failed to parse skills assessment response";

#[derive(Clone)]
pub struct SkillsHolisticAssessor {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
}

impl SkillsHolisticAssessor {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Never fails: transport and parse failures come back as an empty
    /// assessment whose key finding explains what went wrong.
    pub async fn assess(
        &self,
        turns: &[ConversationTurn],
        skill_areas: &[SkillArea],
        context: &CandidateContext,
    ) -> SkillsAssessment {
        info!(
            "Starting holistic skills assessment: {} skill areas over {} turns",
            skill_areas.len(),
            turns.len()
        );

        let messages = match self.build_messages(turns, skill_areas, context) {
            Ok(messages) => messages,
            Err(e) => return transport_failure(e),
        };

        let response = match self
            .llm
            .generate(&messages, Some(&self.prompts.skills_schema))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Skills assessment call failed: {e}");
                return transport_failure(e);
            }
        };

        match parse_typed::<SkillsAssessment>(&response, &SkillsAssessment::REQUIRED_KEYS) {
            Ok((mut assessment, strategy)) => {
                info!(
                    "Skills assessment parsed ({:?}): {} skill areas",
                    strategy,
                    assessment.competency_mapping.len()
                );
                assessment.parsing_error = false;
                assessment.error = None;
                assessment.raw_response_preview = None;
                assessment
            }
            Err(e) => {
                warn!("Failed to parse skills assessment: {e}");
                let mut assessment = SkillsAssessment::empty(SKILLS_PARSE_FAILURE);
                assessment.parsing_error = true;
                assessment.raw_response_preview = Some(preview(&response, FALLBACK_PREVIEW_CHARS));
                assessment
            }
        }
    }

    fn build_messages(
        &self,
        turns: &[ConversationTurn],
        skill_areas: &[SkillArea],
        context: &CandidateContext,
    ) -> serde_json::Result<Vec<ChatMessage>> {
        let system = populate_template(&self.prompts.skills_prompt, context, skill_areas)?;
        let input = json!({
            "transcript_messages": turns,
            "key_skill_areas": skill_areas,
        });
        let user = format!("{SKILLS_ASSESSMENT_PREFIX}{}", serde_json::to_string(&input)?);
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

fn transport_failure(error: impl std::fmt::Display) -> SkillsAssessment {
    let message = error.to_string();
    let mut assessment = SkillsAssessment::empty(format!("Skills assessment failed: {message}"));
    assessment.error = Some(message);
    assessment
}
