use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Candidate and role context. Known keys are typed; anything else the caller
/// sends is kept and forwarded to the prompt untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateContext {
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub company_profile: Option<String>,
    #[serde(default)]
    pub job_requirements: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CandidateContext {
    pub fn job_requirements(&self) -> &str {
        self.job_requirements.as_deref().unwrap_or_default()
    }
}

/// A configured skill area the holistic assessment must cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillArea {
    pub name: String,
    #[serde(rename = "subSkillAreas", alias = "sub_skill_areas", default)]
    pub sub_skill_areas: Vec<String>,
    #[serde(
        rename = "difficultyLevel",
        alias = "difficulty_level",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_resume_keys_are_preserved() {
        let ctx: CandidateContext = serde_json::from_value(json!({
            "candidate_name": "Jane Doe",
            "job_requirements": "5+ years Node.js",
            "years_experience": 6,
            "skills": ["Node.js", "TypeScript"]
        }))
        .unwrap();

        assert_eq!(ctx.job_requirements(), "5+ years Node.js");
        assert_eq!(ctx.extra["years_experience"], 6);

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["skills"][1], "TypeScript");
    }

    #[test]
    fn test_missing_job_requirements_is_empty() {
        assert_eq!(CandidateContext::default().job_requirements(), "");
    }

    #[test]
    fn test_skill_area_wire_names() {
        let area: SkillArea = serde_json::from_value(json!({
            "name": "Programming & Development",
            "subSkillAreas": ["Node.js", "TypeScript"],
            "difficultyLevel": "medium"
        }))
        .unwrap();
        assert_eq!(area.sub_skill_areas.len(), 2);
        assert_eq!(area.difficulty_level.as_deref(), Some("medium"));
    }
}
