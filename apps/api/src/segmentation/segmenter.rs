//! Groups transcript turns into question/answer segments with one LLM call.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::evaluation::prompts::{PromptSet, SEGMENTATION_PREFIX};
use crate::llm_client::{ChatMessage, LlmProvider};
use crate::models::evaluation::FALLBACK_PREVIEW_CHARS;
use crate::models::transcript::{build_conversations, ConversationTurn, QuestionGroupSet};
use crate::parsing::structured::{parse_typed, preview};
use crate::segmentation::questions::KnownQuestion;

const REQUIRED_KEYS: [&str; 1] = ["groups"];

#[derive(Clone)]
pub struct QuestionSegmenter {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
}

impl QuestionSegmenter {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Returned groups have their conversations filled from `turns`.
    pub async fn segment(
        &self,
        turns: &[ConversationTurn],
        known_questions: &[KnownQuestion],
    ) -> Result<QuestionGroupSet, AppError> {
        info!(
            "Segmenting {} turns against {} known questions",
            turns.len(),
            known_questions.len()
        );

        let messages = self
            .build_messages(turns, known_questions)
            .context("Failed to build segmentation prompt")?;

        let response = self
            .llm
            .generate(&messages, Some(&self.prompts.segmentation_schema))
            .await
            .map_err(|e| AppError::Llm(format!("Segmentation call failed: {e}")))?;

        let (set, strategy) = parse_typed::<QuestionGroupSet>(&response, &REQUIRED_KEYS)
            .map_err(|e| {
                warn!(
                    "Failed to parse segmentation response: {e} (preview: {:?})",
                    preview(&response, FALLBACK_PREVIEW_CHARS)
                );
                AppError::Llm(format!("Failed to parse segmentation response: {e}"))
            })?;

        info!(
            "Segmentation parsed ({:?}): {} groups, {} unclear segments",
            strategy,
            set.groups.len(),
            set.misc_or_unclear.len()
        );

        Ok(QuestionGroupSet {
            groups: build_conversations(&set.groups, turns),
            ..set
        })
    }

    fn build_messages(
        &self,
        turns: &[ConversationTurn],
        known_questions: &[KnownQuestion],
    ) -> serde_json::Result<Vec<ChatMessage>> {
        let input = json!({
            "turns": turns,
            "known_questions": known_questions,
        });
        let user = format!("{SEGMENTATION_PREFIX}{}", serde_json::to_string(&input)?);
        Ok(vec![
            ChatMessage::system(self.prompts.segmentation_prompt.clone()),
            ChatMessage::user(user),
        ])
    }
}
