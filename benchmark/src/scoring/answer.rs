//! @ai:module:intent Turn free-form model output into a single move or a move list
//! @ai:module:layer domain
//! @ai:module:public_api extract_move, extract_move_list, Extracted, ExtractionStep, same_san, fenced_block, first_object
//! @ai:module:stateless true

use crate::error::ExtractionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

struct Patterns {
    fenced: Regex,
    quoted_move: Regex,
    loose_move: Regex,
    quoted_moves: Regex,
    quoted_item: Regex,
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(|| {
    Ok(Patterns {
        fenced: Regex::new(r"```[\w-]*[ \t]*\r?\n?([\s\S]*?)```")?,
        quoted_move: Regex::new(r#""move"\s*:\s*"([^"]+)""#)?,
        loose_move: Regex::new(r#"(?i)\bmove\s*[:=]\s*["'`]?([A-Za-z0-9+#=\-]+)"#)?,
        quoted_moves: Regex::new(r#""moves"\s*:\s*\[([^\]]*)\]"#)?,
        quoted_item: Regex::new(r#""([^"]*)""#)?,
    })
});

fn patterns() -> Option<&'static Patterns> {
    PATTERNS.as_ref().ok()
}

/// @ai:intent Which link of the extraction chain produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStep {
    StructuredField,
    EmbeddedObject,
    QuotedKey,
    LooseKey,
    LegalMoveScan,
}

/// @ai:intent Extracted value tagged with the step that found it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<T> {
    pub value: T,
    pub step: ExtractionStep,
}

type MoveStep = fn(&str, &[String]) -> Option<String>;
type ListStep = fn(&str) -> Option<Vec<String>>;

const MOVE_CHAIN: [(ExtractionStep, MoveStep); 5] = [
    (ExtractionStep::StructuredField, |c, _| structured_move(c)),
    (ExtractionStep::EmbeddedObject, |c, _| first_object(c).and_then(structured_move)),
    (ExtractionStep::QuotedKey, |c, _| capture(c, |p| &p.quoted_move)),
    (ExtractionStep::LooseKey, |c, _| capture(c, |p| &p.loose_move)),
    (ExtractionStep::LegalMoveScan, earliest_legal_move),
];

const LIST_CHAIN: [(ExtractionStep, ListStep); 3] = [
    (ExtractionStep::StructuredField, structured_moves),
    (ExtractionStep::EmbeddedObject, |c| first_object(c).and_then(structured_moves)),
    (ExtractionStep::QuotedKey, quoted_moves),
];

/// @ai:intent Extract one move, trying each parser strictly in order
/// @ai:post Err(NoMoveFound) is final; retrying the model call would not change it
/// @ai:effects pure
pub fn extract_move(text: &str, legal_moves: &[String]) -> Result<Extracted<String>, ExtractionError> {
    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let candidate = fenced_block(text).unwrap_or(text);

    MOVE_CHAIN
        .iter()
        .find_map(|(step, parse)| {
            parse(candidate, legal_moves).map(|value| Extracted { value, step: *step })
        })
        .ok_or(ExtractionError::NoMoveFound)
}

/// @ai:intent Extract a list of moves from a `{"moves": [...]}` style answer
/// @ai:effects pure
pub fn extract_move_list(text: &str) -> Result<Extracted<Vec<String>>, ExtractionError> {
    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let candidate = fenced_block(text).unwrap_or(text);

    LIST_CHAIN
        .iter()
        .find_map(|(step, parse)| parse(candidate).map(|value| Extracted { value, step: *step }))
        .ok_or(ExtractionError::NoMoveListFound)
}

/// @ai:intent Contents of the first fenced code block, if any
/// @ai:effects pure
pub fn fenced_block(text: &str) -> Option<&str> {
    patterns()?
        .fenced
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
        .filter(|block| !block.is_empty())
}

/// @ai:intent First balanced top-level `{...}` substring, skipping braces inside strings
/// @ai:effects pure
pub fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// @ai:intent Compare two SAN moves ignoring surrounding space and trailing +, #, ! and ? glyphs
/// @ai:effects pure
pub fn same_san(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.trim().trim_end_matches(['+', '#', '!', '?']).to_string();
    let a = strip(a);
    !a.is_empty() && a == strip(b)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn structured_move(candidate: &str) -> Option<String> {
    let value: Value = serde_json::from_str(candidate.trim()).ok()?;
    value.get("move")?.as_str().and_then(non_empty)
}

fn capture(candidate: &str, pick: fn(&Patterns) -> &Regex) -> Option<String> {
    pick(patterns()?)
        .captures(candidate)
        .and_then(|cap| cap.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

fn earliest_legal_move(candidate: &str, legal_moves: &[String]) -> Option<String> {
    let mut best: Option<(usize, &String)> = None;
    for mv in legal_moves.iter().filter(|mv| !mv.is_empty()) {
        if let Some(index) = candidate.find(mv.as_str()) {
            if best.map(|(at, _)| index < at).unwrap_or(true) {
                best = Some((index, mv));
            }
        }
    }
    best.map(|(_, mv)| mv.clone())
}

fn string_items(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .filter_map(non_empty)
        .collect()
}

fn structured_moves(candidate: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(candidate.trim()).ok()? {
        Value::Object(map) => map.get("moves")?.as_array().map(|items| string_items(items)),
        Value::Array(items) => Some(string_items(&items)),
        _ => None,
    }
}

fn quoted_moves(candidate: &str) -> Option<Vec<String>> {
    let patterns = patterns()?;
    let inner = patterns.quoted_moves.captures(candidate)?.get(1)?.as_str();
    Some(
        patterns
            .quoted_item
            .captures_iter(inner)
            .filter_map(|cap| cap.get(1).and_then(|m| non_empty(m.as_str())))
            .collect(),
    )
}
