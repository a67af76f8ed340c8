use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::candidate::CandidateContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "assistant", alias = "bot")]
    Agent,
    User,
    System,
}

/// One transcript turn. Field names follow the call-log wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(rename = "idx", alias = "index", default)]
    pub index: usize,
    pub role: Role,
    #[serde(default)]
    pub message: String,
    #[serde(
        rename = "time",
        alias = "startTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<f64>,
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(
        rename = "duration",
        alias = "durationMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<f64>,
    #[serde(
        rename = "secondsFromStart",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub seconds_from_start: Option<f64>,
}

/// Raw interview transcript as delivered by the call platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<CandidateContext>,
}

impl Transcript {
    /// Turns with `index` set to their position in the transcript.
    pub fn indexed_turns(&self) -> Vec<ConversationTurn> {
        self.messages
            .iter()
            .enumerate()
            .map(|(index, turn)| ConversationTurn {
                index,
                ..turn.clone()
            })
            .collect()
    }

    /// Candidate context carried in the transcript's `variables`, or an empty one.
    pub fn candidate_context(&self) -> CandidateContext {
        self.variables.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// Identity of a question group, attached to every evaluation outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetadata {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question_title: String,
    #[serde(rename = "type", default)]
    pub group_type: String,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

/// A contiguous slice of transcript turns answering one interview question.
/// Produced by `QuestionSegmenter` or supplied by the caller; read-only during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub question_id: String,
    #[serde(default)]
    pub question_title: String,
    #[serde(rename = "type", default)]
    pub group_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub turn_indices: Vec<usize>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub facts: Value,
    #[serde(rename = "greenFlags", alias = "green_flags", default)]
    pub green_flags: Vec<String>,
    #[serde(rename = "redFlags", alias = "red_flags", default)]
    pub red_flags: Vec<String>,
}

impl QuestionGroup {
    pub fn metadata(&self) -> GroupMetadata {
        GroupMetadata {
            question_id: self.question_id.clone(),
            question_title: self.question_title.clone(),
            group_type: self.group_type.clone(),
            time_range: self.time_range,
        }
    }
}

/// Output of the segmentation step: the groups plus what could not be grouped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionGroupSet {
    #[serde(default)]
    pub groups: Vec<QuestionGroup>,
    #[serde(default)]
    pub misc_or_unclear: Vec<Value>,
    #[serde(default)]
    pub pre_inferred_facts_global: Map<String, Value>,
}

/// Fills each group's `conversation` from its `turn_indices`.
/// Indices past the end of the transcript are skipped.
pub fn build_conversations(groups: &[QuestionGroup], turns: &[ConversationTurn]) -> Vec<QuestionGroup> {
    groups
        .iter()
        .map(|group| {
            let conversation = group
                .turn_indices
                .iter()
                .filter_map(|&idx| {
                    let turn = turns.get(idx).cloned();
                    if turn.is_none() {
                        debug!(
                            "Group {} references turn {} beyond transcript length {}",
                            group.question_id,
                            idx,
                            turns.len()
                        );
                    }
                    turn
                })
                .collect();
            QuestionGroup {
                conversation,
                ..group.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript() -> Transcript {
        serde_json::from_value(json!({
            "messages": [
                {"role": "bot", "message": "Tell me about the event loop.", "time": 1000.0, "secondsFromStart": 0.0},
                {"role": "user", "message": "It runs callbacks from a queue.", "endTime": 4000.0, "duration": 3000.0},
                {"role": "assistant", "message": "Thanks."}
            ],
            "variables": {"candidate_name": "Jane Doe", "job_title": "Backend Engineer"}
        }))
        .unwrap()
    }

    #[test]
    fn test_role_aliases_map_to_agent() {
        let t = transcript();
        assert_eq!(t.messages[0].role, Role::Agent);
        assert_eq!(t.messages[1].role, Role::User);
        assert_eq!(t.messages[2].role, Role::Agent);
    }

    #[test]
    fn test_indexed_turns_are_positional() {
        let turns = transcript().indexed_turns();
        let indices: Vec<usize> = turns.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(turns[1].duration_ms, Some(3000.0));
    }

    #[test]
    fn test_candidate_context_comes_from_variables() {
        let ctx = transcript().candidate_context();
        assert_eq!(ctx.candidate_name.as_deref(), Some("Jane Doe"));
        assert!(Transcript::default().candidate_context().candidate_name.is_none());
    }

    #[test]
    fn test_build_conversations_skips_out_of_range_indices() {
        let turns = transcript().indexed_turns();
        let group: QuestionGroup = serde_json::from_value(json!({
            "question_id": "Q1",
            "question_title": "Event loop",
            "type": "technical",
            "turn_indices": [0, 1, 7]
        }))
        .unwrap();

        let built = build_conversations(&[group], &turns);
        assert_eq!(built[0].conversation.len(), 2);
        assert_eq!(built[0].conversation[1].message, "It runs callbacks from a queue.");
        assert_eq!(built[0].turn_indices, vec![0, 1, 7]);
    }

    #[test]
    fn test_turn_serializes_with_wire_names() {
        let turns = transcript().indexed_turns();
        let value = serde_json::to_value(&turns[0]).unwrap();
        assert_eq!(value["idx"], 0);
        assert_eq!(value["role"], "agent");
        assert_eq!(value["secondsFromStart"], 0.0);
        assert!(value.get("endTime").is_none());
    }

    #[test]
    fn test_group_accepts_both_flag_spellings() {
        let group: QuestionGroup = serde_json::from_value(json!({
            "question_id": "followup-1",
            "green_flags": ["Mentions libuv"],
            "redFlags": ["Claims Node is multithreaded"]
        }))
        .unwrap();
        assert_eq!(group.green_flags, vec!["Mentions libuv"]);
        assert_eq!(group.red_flags.len(), 1);
        assert_eq!(group.metadata().question_id, "followup-1");
    }

    #[test]
    fn test_group_without_question_id_is_rejected() {
        let result: Result<QuestionGroup, _> =
            serde_json::from_value(json!({"question_title": "No id"}));
        assert!(result.is_err());
    }
}
