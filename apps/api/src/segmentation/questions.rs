//! Technical question sheets as written by interviewers.
//!
//! A sheet is plain text where every question starts with a `Q<n>:` marker and
//! may be followed by bulleted green and red flags:
//!
//! ```text
//! Q1: How does Node.js handle async operations?
//! Green flags:
//! - Mentions the event loop
//! Red flags:
//! - Claims it is multithreaded
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static QUESTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Q\d+:").expect("question marker pattern compiles"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalQuestion {
    pub question: String,
    #[serde(default)]
    pub green_flags: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

/// A question as handed to the segmentation model. Ids are positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownQuestion {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "greenFlags")]
    pub green_flags: Vec<String>,
    #[serde(rename = "redFlags")]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum FlagSection {
    Green,
    Red,
}

/// Splits a question sheet on `Q<n>:` markers. Text before the first marker is
/// ignored, as are sections with no question line.
pub fn parse_technical_questions(sheet: &str) -> Vec<TechnicalQuestion> {
    QUESTION_MARKER
        .split(sheet)
        .skip(1)
        .filter_map(parse_section)
        .collect()
}

fn parse_section(section: &str) -> Option<TechnicalQuestion> {
    let mut lines = section.trim().lines();
    let question = lines.next()?.trim();
    if question.is_empty() {
        return None;
    }

    let mut green_flags = Vec::new();
    let mut red_flags = Vec::new();
    let mut current = None;

    for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
        if line.starts_with('G') && line.contains("Green flags:") {
            current = Some(FlagSection::Green);
        } else if line.starts_with("Red flags:") {
            current = Some(FlagSection::Red);
        } else if let Some(flag) = line.strip_prefix("- ") {
            let flag = flag.trim();
            if flag.is_empty() {
                continue;
            }
            match current {
                Some(FlagSection::Green) => green_flags.push(flag.to_string()),
                Some(FlagSection::Red) => red_flags.push(flag.to_string()),
                None => {}
            }
        }
    }

    Some(TechnicalQuestion {
        question: question.to_string(),
        green_flags,
        red_flags,
    })
}

/// Numbers questions `Q1`, `Q2`, ... in sheet order, ignoring the numbers
/// written in the sheet itself.
pub fn prepare_known_questions(questions: &[TechnicalQuestion]) -> Vec<KnownQuestion> {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let n = i + 1;
            KnownQuestion {
                id: format!("Q{n}"),
                title: format!("Question {n}"),
                text: q.question.clone(),
                green_flags: q.green_flags.clone(),
                red_flags: q.red_flags.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "Screening sheet for backend role\n\
        Q1: How does Node.js handle async operations?\n\
        Green flags:\n\
        - Mentions event loop\n\
        - Explains non-blocking I/O\n\
        Red flags:\n\
        - Claims it's multithreaded\n\
        \n\
        Q7: When would you add a database index?\n\
        Red flags:\n\
        - Indexes every column\n";

    #[test]
    fn test_questions_and_flags_are_split_by_marker() {
        let questions = parse_technical_questions(SHEET);
        assert_eq!(questions.len(), 2);

        assert_eq!(questions[0].question, "How does Node.js handle async operations?");
        assert_eq!(
            questions[0].green_flags,
            vec!["Mentions event loop", "Explains non-blocking I/O"]
        );
        assert_eq!(questions[0].red_flags, vec!["Claims it's multithreaded"]);

        assert_eq!(questions[1].question, "When would you add a database index?");
        assert!(questions[1].green_flags.is_empty());
        assert_eq!(questions[1].red_flags, vec!["Indexes every column"]);
    }

    #[test]
    fn test_bullets_before_any_flag_header_are_ignored() {
        let questions = parse_technical_questions("Q1: Explain closures\n- stray bullet\nGreen flags:\n-  \n- Captured scope");
        assert_eq!(questions[0].green_flags, vec!["Captured scope"]);
        assert!(questions[0].red_flags.is_empty());
    }

    #[test]
    fn test_sheet_without_markers_or_with_empty_sections() {
        assert!(parse_technical_questions("Tell me about yourself").is_empty());
        assert!(parse_technical_questions("").is_empty());
        let questions = parse_technical_questions("Q1:\nQ2: Real question");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Real question");
    }

    #[test]
    fn test_crlf_lines_are_trimmed() {
        let questions = parse_technical_questions("Q1: Explain CAP\r\nGreen flags:\r\n- Partition tolerance\r\n");
        assert_eq!(questions[0].question, "Explain CAP");
        assert_eq!(questions[0].green_flags, vec!["Partition tolerance"]);
    }

    #[test]
    fn test_known_questions_are_numbered_by_position() {
        let known = prepare_known_questions(&parse_technical_questions(SHEET));
        assert_eq!(known[1].id, "Q2");
        assert_eq!(known[1].title, "Question 2");
        assert_eq!(known[1].text, "When would you add a database index?");

        let wire = serde_json::to_value(&known[0]).unwrap();
        assert_eq!(wire["greenFlags"][0], "Mentions event loop");
        assert_eq!(wire["redFlags"][0], "Claims it's multithreaded");
    }
}
