//! Ranking engine.
//!
//! Every strategy is a pure function of a candidate list. Scores are written
//! into fresh [`RankedCandidate`] wrappers, never into the input. Input is
//! expected to be pre-filtered to extractable candidates.
//!
//! Shared rules:
//! - Dedup by `(line_start, line_end)`, first seen wins.
//! - Scores that need multiplicity (popularity, heat) are computed before dedup.
//! - Sorts are stable, so ties keep input order.
//! - Line arithmetic is 1-based and inclusive; disjoint ranges overlap by 0.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{Candidate, dedup_by_lines};
use crate::config::RankingStrategy;

/// Score not computed by the strategy that produced this wrapper.
pub const UNSCORED: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// How many input candidates share these lines.
    pub popularity: i64,
    /// Sum of line overlaps with every other input candidate.
    pub heat: i64,
    /// Sum over covered host lines of how many candidates cover each line.
    pub hotspot: i64,
}

impl RankedCandidate {
    fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            popularity: UNSCORED,
            heat: UNSCORED,
            hotspot: UNSCORED,
        }
    }

    pub fn line_key(&self) -> (i64, i64) {
        self.candidate.line_key()
    }
}

/// Inclusive line span of the host function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpan {
    pub line_start: i64,
    pub line_end: i64,
}

/// Overlapping line count of two candidates, clamped at zero.
pub fn overlap(a: &Candidate, b: &Candidate) -> i64 {
    (a.line_end.min(b.line_end) - a.line_start.max(b.line_start) + 1).max(0)
}

/// Dispatch on the configured strategy.
pub fn rank(candidates: &[Candidate], strategy: &RankingStrategy) -> Vec<RankedCandidate> {
    let ranked = match *strategy {
        RankingStrategy::Popularity => rank_by_popularity(candidates),
        RankingStrategy::Heat => rank_by_heat(candidates),
        RankingStrategy::Size => rank_by_size(candidates),
        RankingStrategy::Hotspot {
            host_line_start,
            host_line_end,
        } => rank_by_hotspot(
            candidates,
            HostSpan {
                line_start: host_line_start,
                line_end: host_line_end,
            },
        ),
    };
    debug!(?strategy, input = candidates.len(), ranked = ranked.len(), "candidates ranked");
    ranked
}

/// Most frequently suggested regions first; one-liners last.
pub fn rank_by_popularity(candidates: &[Candidate]) -> Vec<RankedCandidate> {
    let counts = popularity_counts(candidates);
    let mut ranked: Vec<RankedCandidate> = dedup_by_lines(candidates)
        .into_iter()
        .map(|c| {
            let mut r = RankedCandidate::new(c);
            r.popularity = counts[&r.line_key()];
            r
        })
        .collect();
    ranked.sort_by_key(|r| Reverse(r.popularity));
    demote_one_liners(ranked)
}

/// Regions that overlap the most with the rest of the set first.
pub fn rank_by_heat(candidates: &[Candidate]) -> Vec<RankedCandidate> {
    let mut heat_by_lines: HashMap<(i64, i64), i64> = HashMap::new();
    for (i, a) in candidates.iter().enumerate() {
        let heat: i64 = candidates
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, b)| overlap(a, b))
            .sum();
        heat_by_lines.entry(a.line_key()).or_insert(heat);
    }

    let mut ranked: Vec<RankedCandidate> = dedup_by_lines(candidates)
        .into_iter()
        .map(|c| {
            let mut r = RankedCandidate::new(c);
            r.heat = heat_by_lines[&r.line_key()];
            r
        })
        .collect();
    ranked.sort_by_key(|r| Reverse(r.heat));
    ranked
}

/// Largest regions first.
pub fn rank_by_size(candidates: &[Candidate]) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = dedup_by_lines(candidates)
        .into_iter()
        .map(RankedCandidate::new)
        .collect();
    ranked.sort_by_key(|r| Reverse(r.candidate.length()));
    ranked
}

/// Line heat map over `host`: regions covering the most-suggested lines
/// first, weighted by popularity; one-liners last.
pub fn rank_by_hotspot(candidates: &[Candidate], host: HostSpan) -> Vec<RankedCandidate> {
    let in_host = |line: &i64| (host.line_start..=host.line_end).contains(line);

    // Only lines some candidate covers get a counter; the host span may be huge.
    let mut line_heat: HashMap<i64, i64> = HashMap::new();
    for c in candidates {
        for line in (c.line_start..=c.line_end).filter(|line| in_host(line)) {
            *line_heat.entry(line).or_insert(0) += 1;
        }
    }

    let counts = popularity_counts(candidates);
    let mut ranked: Vec<RankedCandidate> = dedup_by_lines(candidates)
        .into_iter()
        .map(|c| {
            let mut r = RankedCandidate::new(c);
            r.popularity = counts[&r.line_key()];
            r.hotspot = (r.candidate.line_start..=r.candidate.line_end)
                .filter(|line| in_host(line))
                .map(|line| line_heat.get(&line).copied().unwrap_or(0))
                .sum();
            r
        })
        .collect();
    ranked.sort_by_key(|r| Reverse(r.hotspot.saturating_mul(r.popularity)));
    demote_one_liners(ranked)
}

fn popularity_counts(candidates: &[Candidate]) -> HashMap<(i64, i64), i64> {
    let mut counts = HashMap::new();
    for c in candidates {
        *counts.entry(c.line_key()).or_insert(0) += 1;
    }
    counts
}

fn demote_one_liners(ranked: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
    let (one_liners, mut rest): (Vec<_>, Vec<_>) =
        ranked.into_iter().partition(|r| r.candidate.length() == 1);
    rest.extend(one_liners);
    rest
}
