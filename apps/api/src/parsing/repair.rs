//! JSON Repair: closes whatever a truncated model response left open.
//!
//! This is a flat character count, not a tokenizer. Braces, brackets, and quotes
//! inside string literals are counted like any other, and closers are always
//! emitted arrays-first. The output is NOT guaranteed to be valid JSON; callers
//! must still attempt a real parse and handle failure.

use once_cell::sync::Lazy;
use regex::Regex;

/// A quoted string directly after `{` or `,` with nothing (or only a colon) after it.
static DANGLING_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[{,]\s*"[^"]*"\s*(:)?\s*$"#).expect("dangling key pattern compiles")
});

/// Best-effort repair of near-valid JSON. Never fails; blank input becomes `{}`.
///
/// Steps, in order:
/// 1. odd quote count and no structural character after the last quote → close the string
/// 2. drop an object key the truncation left without a value
/// 3. append `]` per unmatched `[`, then `}` per unmatched `{`
///
/// Trailing commas (`{"a": 1,}`) are left untouched.
pub fn repair_json(text: &str) -> String {
    if text.trim().is_empty() {
        return "{}".to_string();
    }

    let mut repaired = text.trim_end().to_string();

    if count(&repaired, '"') % 2 == 1 {
        let tail = repaired.rsplit('"').next().unwrap_or_default();
        if !tail.contains(is_structural) {
            repaired.push('"');
        }
    }

    drop_dangling_key(&mut repaired);

    let open_brackets = count(&repaired, '[').saturating_sub(count(&repaired, ']'));
    let open_braces = count(&repaired, '{').saturating_sub(count(&repaired, '}'));

    repaired.extend(std::iter::repeat(']').take(open_brackets));
    repaired.extend(std::iter::repeat('}').take(open_braces));

    repaired
}

fn count(text: &str, needle: char) -> usize {
    text.chars().filter(|&c| c == needle).count()
}

fn is_structural(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':')
}

/// Removes `, "key"` / `, "key":` at the very end of the text when it sits inside an object.
/// A string after `,` inside an array is a value and is kept.
fn drop_dangling_key(text: &mut String) {
    let Some(captures) = DANGLING_KEY.captures(text) else {
        return;
    };
    let Some(whole) = captures.get(0) else {
        return;
    };
    let start = whole.start();
    let has_colon = captures.get(1).is_some();

    if text[start..].starts_with('{') {
        text.truncate(start + 1);
    } else if has_colon || innermost_opener(&text[..start]) == Some('{') {
        text.truncate(start);
    }
}

/// Walks backwards with flat counters and returns the first unmatched `{` or `[`.
fn innermost_opener(prefix: &str) -> Option<char> {
    let mut braces = 0usize;
    let mut brackets = 0usize;

    for c in prefix.chars().rev() {
        match c {
            '}' => braces += 1,
            ']' => brackets += 1,
            '{' if braces == 0 => return Some('{'),
            '{' => braces -= 1,
            '[' if brackets == 0 => return Some('['),
            '[' => brackets -= 1,
            _ => {}
        }
    }
    None
}
