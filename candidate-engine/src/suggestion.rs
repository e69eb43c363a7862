//! Suggestion model and the free-text parser for LLM replies.
//!
//! LLM replies mix prose, markdown and JSON. Instead of parsing JSON we scan
//! for the fixed micro-format
//! `{"function_name": "<name>", "line_start": <int>, "line_end": <int>}` and
//! turn every match into a [`Suggestion`], in order of appearance. Anything
//! that does not match exactly is ignored, so a broken fragment costs only
//! that fragment.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static SUGGESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{"function_name":\s*"([^"]+)",\s*"line_start":\s*(\d+),\s*"line_end":\s*(\d+)\}"#,
    )
    .expect("suggestion pattern compiles")
});

/// One LLM-proposed extraction: a new function name and an approximate,
/// 1-based inclusive line span inside the host source.
///
/// Line numbers are untrusted. They may be zero, past the end of the file or
/// off by a few lines; the candidate factory reconciles them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    pub function_name: String,
    pub line_start: i64,
    pub line_end: i64,
}

impl Suggestion {
    pub fn new(function_name: impl Into<String>, line_start: i64, line_end: i64) -> Self {
        Self {
            function_name: function_name.into(),
            line_start,
            line_end,
        }
    }

    /// A suggestion is usable only when both lines are positive.
    pub fn is_valid(&self) -> bool {
        self.line_start > 0 && self.line_end > 0
    }

    /// Render in the exact micro-format the parser recognizes.
    pub fn to_llm_json(&self) -> String {
        format!(
            r#"{{"function_name": "{}", "line_start": {}, "line_end": {}}}"#,
            self.function_name, self.line_start, self.line_end
        )
    }
}

/// Render a list of suggestions as a JSON-like array, one object per line.
pub fn render_suggestion_list(suggestions: &[Suggestion]) -> String {
    let body = suggestions
        .iter()
        .map(|s| format!("  {}", s.to_llm_json()))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("[\n{body}\n]")
}

/// Extract every suggestion found in `text`. Never fails: unmatched input
/// yields an empty list.
pub fn parse_suggestions(text: &str) -> Vec<Suggestion> {
    let mut out = Vec::new();
    for caps in SUGGESTION_RE.captures_iter(text) {
        let name = &caps[1];
        let (Ok(line_start), Ok(line_end)) = (caps[2].parse::<i64>(), caps[3].parse::<i64>())
        else {
            debug!(function_name = name, "line number does not fit i64, skipping suggestion");
            continue;
        };
        out.push(Suggestion::new(name, line_start, line_end));
    }
    debug!(count = out.len(), "parsed suggestions from LLM text");
    out
}
