//! Candidate model: one suggestion mapped onto a concrete source region.
//!
//! Offsets are byte offsets into the host source (`offset_end` exclusive);
//! lines are 1-based and inclusive. An INVALID candidate carries `-1` offsets
//! and zeroed lines so every suggestion stays representable.
//!
//! Equality and hashing only look at `(line_start, line_end)`: two candidates
//! covering the same lines are "the same" for ranking and dedup purposes,
//! whatever their offsets or type.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::suggestion::Suggestion;

/// How a candidate was derived from its suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateType {
    /// Offsets taken directly from the anchors resolved on the suggested lines.
    AsIs,
    /// Anchors enlarged to the smallest enclosing structural region.
    Adjusted,
    /// The suggestion itself was unusable (non-positive line numbers).
    Invalid,
}

/// Factory heuristic that reshaped an ADJUSTED candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateHeuristic {
    /// Narrowed from a whole else-less `if` to the statements of its body.
    IfBlock,
    /// Widened to take in the preceding statement that assigns a variable the
    /// region uses.
    PrevStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub function_name: String,
    pub offset_start: i64,
    pub offset_end: i64,
    pub line_start: i64,
    pub line_end: i64,
    pub candidate_type: CandidateType,
    /// Last heuristic applied to the region, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heuristic: Option<CandidateHeuristic>,
    /// Originating suggestion, shared by every candidate built from it.
    pub suggestion: Arc<Suggestion>,
}

impl Candidate {
    /// Sentinel for a suggestion that cannot be anchored at all.
    pub fn invalid(suggestion: Arc<Suggestion>) -> Self {
        Self {
            function_name: suggestion.function_name.clone(),
            offset_start: -1,
            offset_end: -1,
            line_start: 0,
            line_end: 0,
            candidate_type: CandidateType::Invalid,
            heuristic: None,
            suggestion,
        }
    }

    /// Build an anchored (non-invalid) candidate.
    pub fn anchored(
        suggestion: Arc<Suggestion>,
        candidate_type: CandidateType,
        offsets: (usize, usize),
        lines: (usize, usize),
    ) -> Self {
        Self {
            function_name: suggestion.function_name.clone(),
            offset_start: offsets.0 as i64,
            offset_end: offsets.1 as i64,
            line_start: lines.0 as i64,
            line_end: lines.1 as i64,
            candidate_type,
            heuristic: None,
            suggestion,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Option<CandidateHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Number of lines covered (inclusive).
    pub fn length(&self) -> i64 {
        self.line_end - self.line_start + 1
    }

    pub fn is_valid(&self) -> bool {
        self.candidate_type != CandidateType::Invalid
    }

    /// Both offsets are usable, i.e. the candidate can be handed to an
    /// extraction service at all.
    pub fn has_offsets(&self) -> bool {
        self.offset_start >= 0 && self.offset_end >= 0
    }

    /// Key used for equality, hashing and dedup.
    pub fn line_key(&self) -> (i64, i64) {
        (self.line_start, self.line_end)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.line_key() == other.line_key()
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.line_key().hash(state);
    }
}

/// Keep the first candidate seen for every `(line_start, line_end)` pair,
/// preserving input order.
pub fn dedup_by_lines(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(c.line_key()))
        .cloned()
        .collect()
}

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationResult {
    Ok,
    Fail,
}

/// What the applier publishes after every attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationPayload {
    pub result: ApplicationResult,
    /// Empty on success; the collaborator's message (possibly empty) on failure.
    pub reason: String,
    pub candidate: Candidate,
}
