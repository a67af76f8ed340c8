//! Structured Output Parser: turns raw model text into a JSON object.
//!
//! Strategies run in order and the first success wins:
//! 1. direct parse of the trimmed text (expected keys enforced)
//! 2. extraction from a ```json fence, a `<json>` tag, or the outermost `{...}` span
//!    (expected keys enforced)
//! 3. `repair_json` + parse, accepted as best-effort with no key check
//!
//! `parse_typed` layers the caller's contract on top: the recovered object must
//! carry every expected key and deserialize into the target type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::parsing::repair::repair_json;

/// Characters of raw input kept in error messages.
pub const ERROR_PREVIEW_CHARS: usize = 200;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fence pattern compiles")
});

static JSON_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<json>\s*(\{.*?\})\s*</json>").expect("tag pattern compiles")
});

static OUTER_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("object pattern compiles"));

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no strategy recovered a JSON object from the response (preview: {preview:?})")]
    Unrecoverable { preview: String },

    #[error("response is missing required keys: {}", .missing.join(", "))]
    MissingKeys { missing: Vec<String> },

    #[error("response does not match the expected shape: {0}")]
    Contract(String),
}

/// Which strategy produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Direct,
    Extracted,
    Repaired,
}

#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub value: Value,
    pub strategy: ParseStrategy,
}

/// Recovers a JSON object from `raw`. Fails only after every strategy has failed.
pub fn parse_structured_output(
    raw: &str,
    expected_keys: &[&str],
) -> Result<ParsedOutput, ParseError> {
    let trimmed = raw.trim();

    if let Some(value) = parse_object(trimmed).filter(|v| has_keys(v, expected_keys)) {
        return Ok(ParsedOutput {
            value,
            strategy: ParseStrategy::Direct,
        });
    }

    for candidate in extraction_candidates(trimmed) {
        if let Some(value) = parse_object(candidate).filter(|v| has_keys(v, expected_keys)) {
            debug!("Recovered JSON from wrapped response ({} chars)", candidate.len());
            return Ok(ParsedOutput {
                value,
                strategy: ParseStrategy::Extracted,
            });
        }
    }

    let repaired = repair_json(trimmed);
    if let Some(value) = parse_object(&repaired) {
        debug!(
            "Recovered JSON via repair ({} -> {} chars)",
            trimmed.len(),
            repaired.len()
        );
        return Ok(ParsedOutput {
            value,
            strategy: ParseStrategy::Repaired,
        });
    }

    Err(ParseError::Unrecoverable {
        preview: preview(raw, ERROR_PREVIEW_CHARS),
    })
}

/// Parses `raw`, then enforces `expected_keys` on whatever was recovered and
/// deserializes it into `T`.
///
/// A repaired object that lost a required key is a failure here even though
/// `parse_structured_output` accepted it.
pub fn parse_typed<T: DeserializeOwned>(
    raw: &str,
    expected_keys: &[&str],
) -> Result<(T, ParseStrategy), ParseError> {
    let parsed = parse_structured_output(raw, expected_keys)?;

    let missing = missing_keys(&parsed.value, expected_keys);
    if !missing.is_empty() {
        return Err(ParseError::MissingKeys { missing });
    }

    let typed = serde_json::from_value(parsed.value)
        .map_err(|e| ParseError::Contract(e.to_string()))?;
    Ok((typed, parsed.strategy))
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

fn extraction_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    for pattern in [&*FENCED_BLOCK, &*JSON_TAG] {
        if let Some(inner) = pattern.captures(text).and_then(|c| c.get(1)) {
            candidates.push(inner.as_str());
        }
    }
    if let Some(span) = OUTER_OBJECT.find(text) {
        candidates.push(span.as_str());
    }
    candidates
}

fn has_keys(value: &Value, keys: &[&str]) -> bool {
    missing_keys(value, keys).is_empty()
}

fn missing_keys(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter(|key| value.get(**key).is_none())
        .map(|key| key.to_string())
        .collect()
}
