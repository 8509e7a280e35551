//! Plain-text rendering of a finished document for delivery.

use std::sync::LazyLock;

use regex::Regex;

/// Body sent when a document has no deliverable content.
pub const EMPTY_BODY: &str = "No content available";

static HEADER_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^(Subject:|From:|To:|Date:|Time:).*$").ok());
static LINK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(.+?)\]\(.+?\)").ok());
static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[.*?\]").ok());
static BOLD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").ok());
static ITALIC: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").ok());
static HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^#+\s+").ok());

fn replace(pattern: &LazyLock<Option<Regex>>, text: String, with: &str) -> String {
    match pattern.as_ref() {
        Some(re) => re.replace_all(&text, with).into_owned(),
        None => text,
    }
}

/// Subject line for a delivered document.
pub fn notification_subject(goal: &str) -> String {
    format!("Final Draft: {}", goal)
}

/// Strips letter headers, `[placeholders]` and markdown from a document.
///
/// Link text is kept. Lines are trimmed and blank lines removed.
pub fn format_delivery_body(document: &str) -> String {
    if document.trim().is_empty() {
        return EMPTY_BODY.to_string();
    }

    let text = replace(&HEADER_LINE, document.to_string(), "");
    let text = replace(&LINK, text, "$1");
    let text = replace(&PLACEHOLDER, text, "");
    let text = replace(&BOLD, text, "$1");
    let text = replace(&ITALIC, text, "$1");
    let text = replace(&HEADING, text, "");

    let body = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if body.is_empty() {
        EMPTY_BODY.to_string()
    } else {
        body
    }
}
