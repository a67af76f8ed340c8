//! Evaluation records: per-group results, the holistic skills assessment, and the
//! merged report returned to callers.
//!
//! Required fields are enforced by deserialization; an LLM response that does not
//! fit these types is treated as a parse failure upstream.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::models::transcript::{ConversationTurn, GroupMetadata};

/// Characters of the raw model response kept on a fallback record.
pub const FALLBACK_PREVIEW_CHARS: usize = 500;

pub const PARSE_FAILURE_SUMMARY: &str = "Failed to parse evaluation response";
pub const PARSE_FAILURE_APPROACH: &str = "Unable to assess due to parsing failure";
pub const PARSE_FAILURE_RECOMMENDATION: &str = "Re-evaluate this response manually";

// ────────────────────────────────────────────────────────────────────────────
// Rating scales
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Hire")]
    StrongHire,
    Hire,
    #[default]
    #[serde(rename = "No Hire")]
    NoHire,
    #[serde(rename = "Strong No Hire")]
    StrongNoHire,
}

impl Recommendation {
    /// Fixed bands: ≥75 Strong Hire, ≥55 Hire, ≥35 No Hire, else Strong No Hire.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Recommendation::StrongHire
        } else if score >= 55.0 {
            Recommendation::Hire
        } else if score >= 35.0 {
            Recommendation::NoHire
        } else {
            Recommendation::StrongNoHire
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    #[default]
    Entry,
    Basic,
    Intermediate,
    Advanced,
    Expert,
}

impl ProficiencyLevel {
    /// Numeric equivalent used when no explicit `skill_score` is given.
    pub fn score(self) -> f64 {
        match self {
            ProficiencyLevel::Expert => 90.0,
            ProficiencyLevel::Advanced => 80.0,
            ProficiencyLevel::Intermediate => 70.0,
            ProficiencyLevel::Basic => 60.0,
            ProficiencyLevel::Entry => 50.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-question analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerQuality {
    /// 0–100. Anything non-numeric or out of range is treated as absent.
    #[serde(default, deserialize_with = "lenient_score")]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub completeness: String,
    #[serde(default)]
    pub clarity: String,
    #[serde(default)]
    pub depth: String,
    #[serde(default)]
    pub evidence_provided: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub answer_quality: AnswerQuality,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub green_flags: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|score| (0.0..=100.0).contains(score)))
}

// ────────────────────────────────────────────────────────────────────────────
// Competencies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencySubSkill {
    pub name: String,
    pub proficiency: ProficiencyLevel,
    #[serde(default)]
    pub demonstrated: bool,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub gaps_identified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_score: Option<f64>,
}

/// Identity is `skill_area`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyArea {
    pub skill_area: String,
    pub overall_assessment: ProficiencyLevel,
    #[serde(default)]
    pub meets_requirements: bool,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_score: Option<f64>,
    #[serde(default)]
    pub assessment_notes: Vec<String>,
    #[serde(default)]
    pub sub_skills: Vec<CompetencySubSkill>,
}

// ────────────────────────────────────────────────────────────────────────────
// Per-group evaluation record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    #[serde(rename = "overall_answer_score", alias = "overall_score")]
    pub overall_score: f64,
    #[serde(default)]
    pub overall_key_skill_score: f64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationAssessment {
    #[serde(default = "fair")]
    pub verbal_articulation: String,
    #[serde(default = "fair")]
    pub logical_flow: String,
    #[serde(default = "fair")]
    pub professional_vocabulary: String,
    #[serde(default)]
    pub cultural_fit_indicators: Vec<String>,
}

impl Default for CommunicationAssessment {
    fn default() -> Self {
        Self {
            verbal_articulation: fair(),
            logical_flow: fair(),
            professional_vocabulary: fair(),
            cultural_fit_indicators: vec![],
        }
    }
}

fn fair() -> String {
    "Fair".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalAnalysis {
    #[serde(default)]
    pub problem_solving_approach: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub exceptional_responses: Vec<String>,
    #[serde(default)]
    pub inconsistencies: Vec<String>,
}

/// One question group's evaluation, either parsed from the model or the
/// parse-failure fallback. Both serialize to the same set of keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub overall_assessment: OverallAssessment,
    pub competency_mapping: Vec<CompetencyArea>,
    pub question_analysis: Vec<QuestionAnalysis>,
    #[serde(default)]
    pub communication_assessment: CommunicationAssessment,
    #[serde(default)]
    pub critical_analysis: CriticalAnalysis,
    #[serde(default)]
    pub improvement_recommendations: Vec<String>,
    #[serde(default)]
    pub group_metadata: GroupMetadata,
    #[serde(default)]
    pub parsing_error: bool,
    #[serde(default)]
    pub raw_response_preview: Option<String>,
}

impl EvaluationRecord {
    /// Top-level keys a model response must carry to count as an evaluation.
    pub const REQUIRED_KEYS: [&'static str; 3] =
        ["overall_assessment", "competency_mapping", "question_analysis"];

    /// Content-neutral record substituted when the response cannot be parsed.
    pub fn parsing_fallback(raw_response: &str, group_metadata: GroupMetadata) -> Self {
        Self {
            overall_assessment: OverallAssessment {
                recommendation: Recommendation::NoHire,
                confidence: Confidence::Low,
                overall_score: 0.0,
                overall_key_skill_score: 0.0,
                summary: PARSE_FAILURE_SUMMARY.to_string(),
            },
            competency_mapping: vec![],
            question_analysis: vec![],
            communication_assessment: CommunicationAssessment::default(),
            critical_analysis: CriticalAnalysis {
                problem_solving_approach: PARSE_FAILURE_APPROACH.to_string(),
                ..CriticalAnalysis::default()
            },
            improvement_recommendations: vec![PARSE_FAILURE_RECOMMENDATION.to_string()],
            group_metadata,
            parsing_error: true,
            raw_response_preview: Some(raw_response.chars().take(FALLBACK_PREVIEW_CHARS).collect()),
        }
    }

    /// Checks value ranges serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let score = self.overall_assessment.overall_score;
        if !(0.0..=100.0).contains(&score) {
            return Err(format!("overall score {score} is outside 0–100"));
        }
        Ok(())
    }
}

/// A group whose LLM call itself failed. Excluded from every aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedGroup {
    pub error: String,
    pub group_metadata: GroupMetadata,
}

/// Terminal state of one group's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupOutcome {
    Evaluated(EvaluationRecord),
    Failed(FailedGroup),
}

impl GroupOutcome {
    pub fn failed(error: impl Into<String>, group_metadata: GroupMetadata) -> Self {
        GroupOutcome::Failed(FailedGroup {
            error: error.into(),
            group_metadata,
        })
    }

    pub fn record(&self) -> Option<&EvaluationRecord> {
        match self {
            GroupOutcome::Evaluated(record) => Some(record),
            GroupOutcome::Failed(_) => None,
        }
    }

    pub fn group_metadata(&self) -> &GroupMetadata {
        match self {
            GroupOutcome::Evaluated(record) => &record.group_metadata,
            GroupOutcome::Failed(failed) => &failed.group_metadata,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Holistic skills assessment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsSummary {
    #[serde(default)]
    pub total_skill_areas_assessed: u32,
    #[serde(default)]
    pub skill_areas_meeting_requirements: u32,
    #[serde(default)]
    pub strongest_skill_areas: Vec<String>,
    #[serde(default)]
    pub development_areas: Vec<String>,
    pub overall_competency_level: ProficiencyLevel,
    pub hiring_recommendation_skills: Recommendation,
    #[serde(default)]
    pub key_findings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsAssessment {
    pub competency_mapping: Vec<CompetencyArea>,
    pub overall_skills_summary: SkillsSummary,
    #[serde(default)]
    pub parsing_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response_preview: Option<String>,
}

impl SkillsAssessment {
    pub const REQUIRED_KEYS: [&'static str; 2] = ["competency_mapping", "overall_skills_summary"];

    /// Empty assessment with a single key finding explaining what went wrong.
    pub fn empty(finding: impl Into<String>) -> Self {
        Self {
            competency_mapping: vec![],
            overall_skills_summary: SkillsSummary {
                total_skill_areas_assessed: 0,
                skill_areas_meeting_requirements: 0,
                strongest_skill_areas: vec![],
                development_areas: vec![],
                overall_competency_level: ProficiencyLevel::Entry,
                hiring_recommendation_skills: Recommendation::NoHire,
                key_findings: vec![finding.into()],
            },
            parsing_error: false,
            error: None,
            raw_response_preview: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Merged report
// ────────────────────────────────────────────────────────────────────────────

/// How the report's competency mapping was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetencyMergeStrategy {
    /// Skill-area-keyed merge of per-group competency data.
    PerGroupAggregate,
    /// The holistic skills assessment's mapping, verbatim.
    HolisticPassthrough,
}

/// Bookkeeping that makes exclusions and degraded states visible to a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub total_groups: usize,
    pub evaluated_groups: usize,
    pub failed_groups: usize,
    pub parsing_failures: usize,
    pub scored_questions: usize,
    pub total_question_analyses: usize,
    pub competency_strategy: CompetencyMergeStrategy,
    pub degraded: bool,
    pub degradation_reasons: Vec<String>,
    pub failures: Vec<FailedGroup>,
}

/// The aggregate evaluation. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedReport {
    pub overall_assessment: OverallAssessment,
    pub competency_mapping: Vec<CompetencyArea>,
    pub question_analysis: Vec<QuestionAnalysis>,
    pub communication_assessment: CommunicationAssessment,
    pub critical_analysis: CriticalAnalysis,
    pub improvement_recommendations: Vec<String>,
    pub evaluation_summary: MergeSummary,
    pub pre_inferred_facts_global: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn keys(value: &Value) -> BTreeSet<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    fn minimal_record_json() -> Value {
        json!({
            "overall_assessment": {
                "recommendation": "Hire",
                "confidence": "Medium",
                "overall_score": 70,
                "summary": "Solid answer"
            },
            "competency_mapping": [],
            "question_analysis": [{
                "question_id": "Q1",
                "question_text": "Explain the event loop",
                "answer_quality": {"relevance_score": 75, "evidence_provided": true}
            }]
        })
    }

    #[test]
    fn test_recommendation_boundaries() {
        let cases = [
            (74.9, Recommendation::Hire),
            (75.0, Recommendation::StrongHire),
            (54.9, Recommendation::NoHire),
            (55.0, Recommendation::Hire),
            (34.9, Recommendation::StrongNoHire),
            (35.0, Recommendation::NoHire),
        ];
        for (score, expected) in cases {
            assert_eq!(Recommendation::from_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_recommendation_wire_labels() {
        assert_eq!(
            serde_json::to_value(Recommendation::StrongNoHire).unwrap(),
            "Strong No Hire"
        );
        let parsed: Recommendation = serde_json::from_value(json!("Strong Hire")).unwrap();
        assert_eq!(parsed, Recommendation::StrongHire);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(ProficiencyLevel::Expert > ProficiencyLevel::Advanced);
        assert!(ProficiencyLevel::Basic > ProficiencyLevel::Entry);
        assert!(Confidence::High > Confidence::Medium);
        assert_eq!(ProficiencyLevel::Intermediate.score(), 70.0);
    }

    #[test]
    fn test_score_field_accepts_both_names() {
        let a: OverallAssessment = serde_json::from_value(json!({
            "recommendation": "Hire", "confidence": "High", "overall_score": 61
        }))
        .unwrap();
        let b: OverallAssessment = serde_json::from_value(json!({
            "recommendation": "Hire", "confidence": "High", "overall_answer_score": 61
        }))
        .unwrap();
        assert_eq!(a.overall_score, 61.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_numeric_relevance_score_is_absent() {
        let quality: AnswerQuality =
            serde_json::from_value(json!({"relevance_score": "high"})).unwrap();
        assert_eq!(quality.relevance_score, None);

        let quality: AnswerQuality =
            serde_json::from_value(json!({"relevance_score": 140})).unwrap();
        assert_eq!(quality.relevance_score, None);

        let quality: AnswerQuality =
            serde_json::from_value(json!({"relevance_score": 42.5})).unwrap();
        assert_eq!(quality.relevance_score, Some(42.5));
    }

    #[test]
    fn test_fallback_and_parsed_record_share_top_level_keys() {
        let parsed: EvaluationRecord = serde_json::from_value(minimal_record_json()).unwrap();
        let fallback = EvaluationRecord::parsing_fallback("garbage", GroupMetadata::default());

        let parsed_keys = keys(&serde_json::to_value(&parsed).unwrap());
        let fallback_keys = keys(&serde_json::to_value(&fallback).unwrap());
        assert_eq!(parsed_keys, fallback_keys);
    }

    #[test]
    fn test_fallback_content_is_neutral() {
        let raw = "x".repeat(2000);
        let fallback = EvaluationRecord::parsing_fallback(&raw, GroupMetadata::default());
        assert!(fallback.parsing_error);
        assert_eq!(fallback.overall_assessment.overall_score, 0.0);
        assert_eq!(fallback.overall_assessment.recommendation, Recommendation::NoHire);
        assert_eq!(fallback.overall_assessment.confidence, Confidence::Low);
        assert_eq!(fallback.overall_assessment.summary, PARSE_FAILURE_SUMMARY);
        assert!(fallback.question_analysis.is_empty());
        assert_eq!(
            fallback.raw_response_preview.unwrap().len(),
            FALLBACK_PREVIEW_CHARS
        );
    }

    #[test]
    fn test_record_without_competency_mapping_is_rejected() {
        let mut value = minimal_record_json();
        value.as_object_mut().unwrap().remove("competency_mapping");
        assert!(serde_json::from_value::<EvaluationRecord>(value).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_score() {
        let mut record: EvaluationRecord = serde_json::from_value(minimal_record_json()).unwrap();
        assert!(record.validate().is_ok());
        record.overall_assessment.overall_score = 101.0;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_failed_outcome_serializes_error_and_metadata_only() {
        let outcome = GroupOutcome::failed(
            "Failed to evaluate group: timeout",
            GroupMetadata {
                question_id: "Q2".to_string(),
                ..GroupMetadata::default()
            },
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            keys(&value),
            BTreeSet::from(["error".to_string(), "group_metadata".to_string()])
        );
        assert_eq!(outcome.group_metadata().question_id, "Q2");
        assert!(outcome.record().is_none());
    }

    #[test]
    fn test_empty_skills_assessment_defaults() {
        let empty = SkillsAssessment::empty("Failed to parse skills assessment response");
        assert!(empty.competency_mapping.is_empty());
        assert_eq!(
            empty.overall_skills_summary.overall_competency_level,
            ProficiencyLevel::Entry
        );
        assert_eq!(
            empty.overall_skills_summary.hiring_recommendation_skills,
            Recommendation::NoHire
        );
        assert_eq!(empty.overall_skills_summary.key_findings.len(), 1);
    }
}
