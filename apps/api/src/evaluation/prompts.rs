//! Prompt resources for every LLM pass: segmentation, evaluation, skills and question generation.
//! Templates and schemas live on disk under PROMPTS_DIR and are loaded once at startup;
//! a missing or malformed resource is a fatal configuration error.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::models::candidate::CandidateContext;

pub const EVALUATION_PROMPT_FILE: &str = "evaluate.md";
pub const EVALUATION_SCHEMA_FILE: &str = "evaluation.schema.json";
pub const SKILLS_PROMPT_FILE: &str = "assess_skills.md";
pub const SKILLS_SCHEMA_FILE: &str = "skills_assessment.schema.json";
pub const SEGMENTATION_PROMPT_FILE: &str = "gather.md";
pub const SEGMENTATION_SCHEMA_FILE: &str = "gather.schema.json";
pub const QUESTION_GENERATION_PROMPT_FILE: &str = "generate_questions.md";
pub const QUESTION_GENERATION_SCHEMA_FILE: &str = "question_generation.schema.json";

pub const RESUME_PLACEHOLDER: &str = "{{RESUME_CONTENT}}";
pub const JOB_REQUIREMENTS_PLACEHOLDER: &str = "{{JOB_REQUIREMENTS}}";
pub const SKILL_AREAS_PLACEHOLDER: &str = "{{KEY_SKILL_AREAS}}";

/// User-message prefix for a single question group.
pub const GROUP_EVALUATION_PREFIX: &str = "Evaluate this specific question group: ";

/// User-message prefix for the holistic skills pass.
pub const SKILLS_ASSESSMENT_PREFIX: &str =
    "Assess skills competency based on this complete interview data: ";

/// User-message prefix for transcript segmentation.
pub const SEGMENTATION_PREFIX: &str = "Input data: ";

/// User-message prefix for question generation.
pub const QUESTION_GENERATION_PREFIX: &str = "Generate interview questions for this job: ";

/// Immutable prompt templates and output schemas.
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    pub evaluation_prompt: String,
    pub evaluation_schema: Value,
    pub skills_prompt: String,
    pub skills_schema: Value,
    pub segmentation_prompt: String,
    pub segmentation_schema: Value,
    pub question_generation_prompt: String,
    pub question_generation_schema: Value,
}

impl PromptSet {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            evaluation_prompt: read_text(dir, EVALUATION_PROMPT_FILE)?,
            evaluation_schema: read_schema(dir, EVALUATION_SCHEMA_FILE)?,
            skills_prompt: read_text(dir, SKILLS_PROMPT_FILE)?,
            skills_schema: read_schema(dir, SKILLS_SCHEMA_FILE)?,
            segmentation_prompt: read_text(dir, SEGMENTATION_PROMPT_FILE)?,
            segmentation_schema: read_schema(dir, SEGMENTATION_SCHEMA_FILE)?,
            question_generation_prompt: read_text(dir, QUESTION_GENERATION_PROMPT_FILE)?,
            question_generation_schema: read_schema(dir, QUESTION_GENERATION_SCHEMA_FILE)?,
        })
    }
}

fn read_text(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    std::fs::read_to_string(&path)
        .with_context(|| format!("Error loading prompt '{}'", path.display()))
}

fn read_schema(dir: &Path, file: &str) -> Result<Value> {
    let raw = read_text(dir, file)?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Schema '{}' is not valid JSON", dir.join(file).display()))
}

/// Fills the candidate-context placeholders of a system prompt template.
/// Per-group evaluation passes no skill areas, which renders as `[]`.
pub fn populate_template<S: Serialize>(
    template: &str,
    context: &CandidateContext,
    skill_areas: &[S],
) -> serde_json::Result<String> {
    let resume_json = serde_json::to_string_pretty(context)?;
    let skill_areas_json = serde_json::to_string_pretty(skill_areas)?;

    Ok(template
        .replace(RESUME_PLACEHOLDER, &resume_json)
        .replace(JOB_REQUIREMENTS_PLACEHOLDER, context.job_requirements())
        .replace(SKILL_AREAS_PLACEHOLDER, &skill_areas_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::SkillArea;

    fn shipped_prompts_dir() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../prompts")
    }

    fn context() -> CandidateContext {
        CandidateContext {
            candidate_name: Some("Jane Doe".to_string()),
            job_requirements: Some("Strong Node.js".to_string()),
            ..CandidateContext::default()
        }
    }

    #[test]
    fn test_shipped_prompts_load() {
        let prompts = PromptSet::load(&shipped_prompts_dir()).unwrap();
        assert!(prompts.evaluation_prompt.contains(RESUME_PLACEHOLDER));
        assert!(prompts.skills_prompt.contains(SKILL_AREAS_PLACEHOLDER));
        assert_eq!(prompts.evaluation_schema["type"], "object");
        assert_eq!(prompts.skills_schema["type"], "object");
        assert_eq!(prompts.segmentation_schema["required"][0], "groups");
        assert_eq!(prompts.question_generation_schema["required"][0], "questions");
        assert!(!prompts.segmentation_prompt.is_empty());
        assert!(!prompts.question_generation_prompt.is_empty());
    }

    #[test]
    fn test_missing_prompt_dir_is_an_error() {
        let err = PromptSet::load(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains(EVALUATION_PROMPT_FILE));
    }

    #[test]
    fn test_populate_template_substitutes_all_placeholders() {
        let template = "R={{RESUME_CONTENT}}\nJ={{JOB_REQUIREMENTS}}\nS={{KEY_SKILL_AREAS}}";
        let areas = vec![SkillArea {
            name: "Programming & Development".to_string(),
            sub_skill_areas: vec!["Node.js".to_string()],
            difficulty_level: None,
        }];

        let populated = populate_template(template, &context(), &areas).unwrap();
        assert!(populated.contains("\"candidate_name\": \"Jane Doe\""));
        assert!(populated.contains("J=Strong Node.js"));
        assert!(populated.contains("Programming & Development"));
        assert!(!populated.contains("{{"));
    }

    #[test]
    fn test_populate_template_without_skill_areas_renders_empty_list() {
        let populated =
            populate_template::<SkillArea>("S={{KEY_SKILL_AREAS}}", &context(), &[]).unwrap();
        assert_eq!(populated, "S=[]");
    }
}
