//! Best-effort JSON object extraction from model output.
//!
//! Models wrap structured answers in prose, markdown fences or both, and
//! sometimes stop mid-object. Extraction tries, in order:
//! 1. A ```` ```json ```` fenced block
//! 2. Any other fenced block
//! 3. The first balanced `{...}` span that parses
//!
//! Anything that opens an object but never closes it is reported as
//! [`JsonExtractionResult::Truncated`] so callers can log the difference
//! between "no JSON" and "cut off".

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// A complete object that parses as JSON.
    Success(String),
    /// An object was opened but not closed.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
    },
    /// Nothing object-shaped in the content.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }
}

/// Opening braces tried as object starts before giving up.
const MAX_OBJECT_CANDIDATES: usize = 32;

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z]*)\s*\n?(.*?)```").ok());

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

/// Bodies of fenced blocks, `json`-tagged first.
fn fenced_blocks(content: &str) -> Vec<String> {
    let Some(fence) = FENCE.as_ref() else {
        return Vec::new();
    };
    let mut tagged = Vec::new();
    let mut other = Vec::new();
    for captures in fence.captures_iter(content) {
        let lang = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let body = captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if lang.eq_ignore_ascii_case("json") {
            tagged.push(body);
        } else {
            other.push(body);
        }
    }
    tagged.extend(other);
    tagged
}

/// Index of the `}` closing the object that starts at byte 0 of `s`.
///
/// Braces inside string literals (including escaped quotes) are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Number of `{` left open at the end of `s`, outside strings.
fn unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Finds the first JSON object in `content`.
pub fn try_extract_json_object(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    for block in fenced_blocks(trimmed) {
        if parses(&block) {
            return JsonExtractionResult::Success(block);
        }
    }

    let first_open = trimmed.find('{');
    for (start, _) in trimmed.match_indices('{').take(MAX_OBJECT_CANDIDATES) {
        let rest = &trimmed[start..];
        if let Some(end) = find_matching_brace(rest) {
            let candidate = &rest[..=end];
            if parses(candidate) {
                return JsonExtractionResult::Success(candidate.to_string());
            }
        }
    }

    if let Some(start) = first_open {
        let partial = &trimmed[start..];
        let open = unclosed_braces(partial);
        if open > 0 {
            return JsonExtractionResult::Truncated {
                partial_json: partial.to_string(),
                unclosed_braces: open,
            };
        }
    }

    JsonExtractionResult::NotFound
}

/// Extracts and deserializes the first JSON object in `content`.
///
/// Returns `None` on any failure; callers supply their own fallback.
pub fn decode_json_object<T: DeserializeOwned>(content: &str) -> Option<T> {
    match try_extract_json_object(content) {
        JsonExtractionResult::Success(json) => match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "JSON object did not match the expected shape");
                None
            }
        },
        JsonExtractionResult::Truncated {
            unclosed_braces, ..
        } => {
            tracing::debug!(unclosed_braces, "JSON object in model output is truncated");
            None
        }
        JsonExtractionResult::NotFound => None,
    }
}
