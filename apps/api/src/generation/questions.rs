//! Phone-screen question generation from a job description and skill matrix.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::evaluation::prompts::{PromptSet, QUESTION_GENERATION_PREFIX};
use crate::llm_client::{ChatMessage, LlmProvider};
use crate::models::evaluation::FALLBACK_PREVIEW_CHARS;
use crate::parsing::structured::{parse_typed, preview, ParseError};

static QUESTION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q\d+\.\d+\.\d+$").expect("generated question id pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    Experience,
    Tradeoff,
    ConceptApplication,
    ConceptDefinition,
    Concept,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question: String,
    pub linked_skill_area: String,
    pub linked_sub_skill_area: String,
    pub difficulty_level: DifficultyLevel,
    pub question_type: QuestionType,
    pub green_flags: Vec<String>,
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_answer: Option<u32>,
    /// `Q<skill>.<sub-skill>.<n>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub expected_answer_points: Vec<String>,
}

impl GeneratedQuestion {
    /// Bounds the model is asked to respect. Optional fields are checked only
    /// when present.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.question.chars().count();
        if !(10..=500).contains(&len) {
            return Err(format!("question text has {len} characters, expected 10 to 500"));
        }
        for (name, flags) in [("greenFlags", &self.green_flags), ("redFlags", &self.red_flags)] {
            if !(3..=5).contains(&flags.len()) {
                return Err(format!("{name} has {} entries, expected 3 to 5", flags.len()));
            }
        }
        if !self.follow_ups.is_empty() && self.follow_ups.len() != 3 {
            return Err(format!("followUps has {} entries, expected 3", self.follow_ups.len()));
        }
        if let Some(seconds) = self.time_to_answer {
            if !(60..=300).contains(&seconds) {
                return Err(format!("timeToAnswer {seconds} is outside 60 to 300 seconds"));
            }
        }
        if let Some(id) = &self.question_id {
            if !QUESTION_ID.is_match(id) {
                return Err(format!("questionId {id:?} does not look like Q1.2.3"));
            }
        }
        if !self.expected_answer_points.is_empty() && !(2..=5).contains(&self.expected_answer_points.len()) {
            return Err(format!(
                "expectedAnswerPoints has {} entries, expected 2 to 5",
                self.expected_answer_points.len()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub total_questions: usize,
    pub skill_areas_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGenerationResponse {
    pub questions: Vec<GeneratedQuestion>,
    pub metadata: GenerationMetadata,
}

pub struct QuestionGenerator {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// `skills` is forwarded to the model as given. One invalid question
    /// rejects the whole response.
    pub async fn generate(
        &self,
        job_description: &str,
        skills: &[Value],
    ) -> Result<Vec<GeneratedQuestion>, AppError> {
        info!("Generating interview questions for {} skill areas", skills.len());

        let input = json!({
            "job_description": job_description,
            "skills": skills,
        });
        let user = format!(
            "{QUESTION_GENERATION_PREFIX}{}",
            serde_json::to_string_pretty(&input).context("Failed to build question generation prompt")?
        );
        let messages = [
            ChatMessage::system(self.prompts.question_generation_prompt.clone()),
            ChatMessage::user(user),
        ];

        let response = self
            .llm
            .generate(&messages, Some(&self.prompts.question_generation_schema))
            .await
            .map_err(|e| AppError::Llm(format!("Question generation call failed: {e}")))?;

        let questions = parse_questions(&response).map_err(|e| {
            warn!(
                "Failed to parse question generation response: {e} (preview: {:?})",
                preview(&response, FALLBACK_PREVIEW_CHARS)
            );
            AppError::Llm(format!("Failed to parse question generation response: {e}"))
        })?;

        info!("Generated {} questions", questions.len());
        Ok(questions)
    }
}

fn parse_questions(raw: &str) -> Result<Vec<GeneratedQuestion>, ParseError> {
    let (parsed, _) = parse_typed::<GeneratedQuestions>(raw, &["questions"])?;
    for (i, question) in parsed.questions.iter().enumerate() {
        question
            .validate()
            .map_err(|e| ParseError::Contract(format!("question {}: {e}", i + 1)))?;
    }
    Ok(parsed.questions)
}
