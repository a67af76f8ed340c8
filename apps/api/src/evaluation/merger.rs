//! Evaluation merger: folds per-group outcomes and the optional holistic skills
//! assessment into one `MergedReport`.
//!
//! Pure and deterministic. Failed groups are excluded from every aggregate and
//! only counted; parse-failure fallback records take part like any other record.
//! Each step is a standalone function so it can be tested in isolation.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::models::evaluation::{
    CommunicationAssessment, CompetencyArea, CompetencyMergeStrategy, CompetencySubSkill,
    Confidence, CriticalAnalysis, EvaluationRecord, FailedGroup, GroupOutcome, MergeSummary,
    MergedReport, OverallAssessment, QuestionAnalysis, Recommendation, SkillsAssessment,
};

pub const NO_APPROACH_PLACEHOLDER: &str = "No clear problem-solving approach demonstrated";

/// Canonical question ids. Anything else (follow-ups, custom questions) is
/// evaluated but never counts toward the headline score.
static Q_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q\d+$").expect("question id pattern compiles"));

pub fn is_q_numbered(question_id: &str) -> bool {
    Q_NUMBERED.is_match(question_id)
}

pub fn merge_evaluations(
    outcomes: &[GroupOutcome],
    global_facts: &Map<String, Value>,
    skills: Option<&SkillsAssessment>,
) -> MergedReport {
    let records: Vec<&EvaluationRecord> = outcomes.iter().filter_map(GroupOutcome::record).collect();
    let failures: Vec<FailedGroup> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            GroupOutcome::Failed(failed) => Some(failed.clone()),
            GroupOutcome::Evaluated(_) => None,
        })
        .collect();
    let parsing_failures = records.iter().filter(|r| r.parsing_error).count();

    info!(
        "Merging {} outcomes ({} evaluated, {} failed, {} parse fallbacks)",
        outcomes.len(),
        records.len(),
        failures.len(),
        parsing_failures
    );

    let strategy = select_strategy(skills);
    let competency_mapping = merge_competencies(strategy, &records, skills);
    let question_analysis = collect_question_analysis(&records);
    let critical_analysis = merge_critical_analysis(&records);
    let improvement_recommendations = dedup_recommendations(&records);

    let score = compute_overall_score(&question_analysis);
    let key_skill_score = overall_key_skill_score(&competency_mapping);

    let mut degradation_reasons = Vec::new();
    if score.scored_questions == 0 {
        warn!("No valid Q-numbered questions found for overall score calculation");
        degradation_reasons.push("No Q-numbered questions with a numeric score".to_string());
    }
    if key_skill_score.is_none() {
        warn!("No competency data available for key skill score");
        degradation_reasons.push("No competency data available".to_string());
    }
    if !failures.is_empty() {
        degradation_reasons.push(format!("{} question group(s) failed to evaluate", failures.len()));
    }
    if parsing_failures > 0 {
        degradation_reasons.push(format!(
            "{parsing_failures} question group response(s) could not be parsed"
        ));
    }

    let overall_assessment = OverallAssessment {
        recommendation: score.recommendation,
        confidence: Confidence::Medium,
        overall_score: score.score,
        overall_key_skill_score: key_skill_score.unwrap_or(0.0),
        summary: summary_text(&score),
    };

    let evaluation_summary = MergeSummary {
        total_groups: outcomes.len(),
        evaluated_groups: records.len(),
        failed_groups: failures.len(),
        parsing_failures,
        scored_questions: score.scored_questions,
        total_question_analyses: score.total_question_analyses,
        competency_strategy: strategy,
        degraded: !degradation_reasons.is_empty(),
        degradation_reasons,
        failures,
    };

    info!(
        "Merge complete: score {} ({:?}) from {} of {} question analyses, key skill score {}",
        overall_assessment.overall_score,
        overall_assessment.recommendation,
        evaluation_summary.scored_questions,
        evaluation_summary.total_question_analyses,
        overall_assessment.overall_key_skill_score
    );

    MergedReport {
        overall_assessment,
        competency_mapping,
        question_analysis,
        communication_assessment: CommunicationAssessment::default(),
        critical_analysis,
        improvement_recommendations,
        evaluation_summary,
        pre_inferred_facts_global: global_facts.clone(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Competency mapping
// ────────────────────────────────────────────────────────────────────────────

/// A supplied skills assessment supersedes per-group competency data.
pub fn select_strategy(skills: Option<&SkillsAssessment>) -> CompetencyMergeStrategy {
    match skills {
        Some(_) => CompetencyMergeStrategy::HolisticPassthrough,
        None => CompetencyMergeStrategy::PerGroupAggregate,
    }
}

pub fn merge_competencies(
    strategy: CompetencyMergeStrategy,
    records: &[&EvaluationRecord],
    skills: Option<&SkillsAssessment>,
) -> Vec<CompetencyArea> {
    match (strategy, skills) {
        (CompetencyMergeStrategy::HolisticPassthrough, Some(skills)) => {
            info!(
                "Using holistic skills assessment for competency mapping ({} skill areas)",
                skills.competency_mapping.len()
            );
            skills.competency_mapping.clone()
        }
        _ => aggregate_competencies(
            records
                .iter()
                .flat_map(|record| record.competency_mapping.iter()),
        ),
    }
}

/// Skill-area-keyed merge in first-seen order. Duplicate areas and sub-skills
/// keep the highest level and confidence and the union of their evidence.
pub fn aggregate_competencies<'a>(
    areas: impl IntoIterator<Item = &'a CompetencyArea>,
) -> Vec<CompetencyArea> {
    let mut merged: Vec<CompetencyArea> = Vec::new();

    for area in areas {
        match merged.iter_mut().find(|m| m.skill_area == area.skill_area) {
            Some(existing) => {
                existing.overall_assessment = existing.overall_assessment.max(area.overall_assessment);
                existing.confidence = existing.confidence.max(area.confidence);
                existing.meets_requirements |= area.meets_requirements;
                existing.skill_score = max_score(existing.skill_score, area.skill_score);
                extend_unique(&mut existing.assessment_notes, &area.assessment_notes);
                for sub_skill in &area.sub_skills {
                    merge_sub_skill(&mut existing.sub_skills, sub_skill);
                }
            }
            None => {
                let mut fresh = CompetencyArea {
                    sub_skills: Vec::new(),
                    assessment_notes: Vec::new(),
                    ..area.clone()
                };
                extend_unique(&mut fresh.assessment_notes, &area.assessment_notes);
                for sub_skill in &area.sub_skills {
                    merge_sub_skill(&mut fresh.sub_skills, sub_skill);
                }
                merged.push(fresh);
            }
        }
    }

    merged
}

fn merge_sub_skill(sub_skills: &mut Vec<CompetencySubSkill>, incoming: &CompetencySubSkill) {
    match sub_skills.iter_mut().find(|s| s.name == incoming.name) {
        Some(existing) => {
            existing.proficiency = existing.proficiency.max(incoming.proficiency);
            existing.confidence = existing.confidence.max(incoming.confidence);
            existing.demonstrated |= incoming.demonstrated;
            existing.skill_score = max_score(existing.skill_score, incoming.skill_score);
            extend_unique(&mut existing.evidence, &incoming.evidence);
            extend_unique(&mut existing.gaps_identified, &incoming.gaps_identified);
        }
        None => sub_skills.push(incoming.clone()),
    }
}

fn max_score(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Average of every area and sub-skill score, falling back to the numeric
/// equivalent of the qualitative level. `None` when there is nothing to average.
pub fn overall_key_skill_score(mapping: &[CompetencyArea]) -> Option<f64> {
    let scores: Vec<f64> = mapping
        .iter()
        .flat_map(|area| {
            std::iter::once(area.skill_score.unwrap_or_else(|| area.overall_assessment.score())).chain(
                area.sub_skills
                    .iter()
                    .map(|sub| sub.skill_score.unwrap_or_else(|| sub.proficiency.score())),
            )
        })
        .collect();

    if scores.is_empty() {
        return None;
    }
    Some(round1(scores.iter().sum::<f64>() / scores.len() as f64))
}

// ────────────────────────────────────────────────────────────────────────────
// Question analysis and critical analysis
// ────────────────────────────────────────────────────────────────────────────

/// Concatenation in group order.
pub fn collect_question_analysis(records: &[&EvaluationRecord]) -> Vec<QuestionAnalysis> {
    records
        .iter()
        .flat_map(|record| record.question_analysis.iter().cloned())
        .collect()
}

/// Longest non-blank problem-solving approach wins; flag lists are unioned.
pub fn merge_critical_analysis(records: &[&EvaluationRecord]) -> CriticalAnalysis {
    let mut merged = CriticalAnalysis::default();

    let mut longest: Option<&str> = None;
    for record in records {
        let critical = &record.critical_analysis;
        let approach = critical.problem_solving_approach.as_str();
        if !approach.trim().is_empty()
            && longest.map_or(true, |best| approach.chars().count() > best.chars().count())
        {
            longest = Some(approach);
        }
        extend_unique(&mut merged.red_flags, &critical.red_flags);
        extend_unique(&mut merged.exceptional_responses, &critical.exceptional_responses);
        extend_unique(&mut merged.inconsistencies, &critical.inconsistencies);
    }

    merged.problem_solving_approach = longest.unwrap_or(NO_APPROACH_PLACEHOLDER).to_string();
    merged
}

/// Union of all recommendations in first-seen order.
pub fn dedup_recommendations(records: &[&EvaluationRecord]) -> Vec<String> {
    let mut recommendations = Vec::new();
    for record in records {
        extend_unique(&mut recommendations, &record.improvement_recommendations);
    }
    recommendations
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    let mut seen: HashSet<String> = target.iter().cloned().collect();
    for item in items {
        if seen.insert(item.clone()) {
            target.push(item.clone());
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// Rounded to one decimal.
    pub score: f64,
    pub recommendation: Recommendation,
    pub scored_questions: usize,
    pub total_question_analyses: usize,
}

/// Averages relevance scores of Q-numbered analyses. Bands are applied to the
/// unrounded average; with nothing to average the score is 0 and the
/// recommendation stays at its default.
pub fn compute_overall_score(analyses: &[QuestionAnalysis]) -> ScoreSummary {
    let scores: Vec<f64> = analyses
        .iter()
        .filter(|qa| is_q_numbered(&qa.question_id))
        .filter_map(|qa| qa.answer_quality.relevance_score)
        .collect();

    if scores.is_empty() {
        return ScoreSummary {
            score: 0.0,
            recommendation: Recommendation::default(),
            scored_questions: 0,
            total_question_analyses: analyses.len(),
        };
    }

    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    ScoreSummary {
        score: round1(average),
        recommendation: Recommendation::from_score(average),
        scored_questions: scores.len(),
        total_question_analyses: analyses.len(),
    }
}

fn summary_text(score: &ScoreSummary) -> String {
    if score.scored_questions == 0 {
        format!(
            "No valid Q-numbered questions found; overall score defaults to 0 ({} question analyses in total).",
            score.total_question_analyses
        )
    } else {
        format!(
            "Evaluation based on {} Q-numbered questions out of {} question analyses. Custom questions are evaluated but excluded from the overall score.",
            score.scored_questions, score.total_question_analyses
        )
    }
}

/// One decimal, ties to even.
fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
