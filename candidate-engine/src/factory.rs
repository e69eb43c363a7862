//! Candidate factory: maps a [`Suggestion`] onto concrete source regions.
//!
//! Every valid suggestion is resolved to two structural anchors (leftmost unit
//! on its start line and on its end line). From those we build:
//!
//! 1. **AS_IS**: start of the start anchor .. end of the end anchor. Line
//!    numbers are recomputed from offsets, which corrects approximate LLM lines.
//! 2. **ADJUSTED**: the anchor pair enlarged to the smallest mutually
//!    enclosing region (see [`adjust_region`]).
//!
//! The ADJUSTED region may then be reshaped by the optional heuristics
//! ([`narrow_to_if_body`], [`widen_to_prev_assignment`]), which tag the
//! candidate they change.
//!
//! Both collapse into one candidate when their offsets coincide. Invalid
//! suggestions always produce the INVALID sentinel so nothing is silently
//! dropped; unresolvable anchors produce nothing.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::candidate::{Candidate, CandidateHeuristic, CandidateType};
use crate::config::FactoryConfig;
use crate::structure::{StructuralQuery, StructuralUnit};
use crate::suggestion::Suggestion;

/// Stateless apart from its configuration; one instance can serve any
/// number of suggestions and structural indexes.
#[derive(Debug, Clone, Default)]
pub struct CandidateFactory {
    config: FactoryConfig,
}

impl CandidateFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Candidates for one suggestion: the INVALID sentinel, nothing, or one or
    /// two anchored candidates (AS_IS first).
    pub fn build<Q: StructuralQuery>(&self, suggestion: Arc<Suggestion>, query: &Q) -> Vec<Candidate> {
        if !suggestion.is_valid() {
            debug!(
                function_name = %suggestion.function_name,
                line_start = suggestion.line_start,
                line_end = suggestion.line_end,
                "invalid suggestion, emitting sentinel candidate"
            );
            return vec![Candidate::invalid(suggestion)];
        }

        let (Some(start), Some(end)) = (
            anchor_at(query, suggestion.line_start),
            anchor_at(query, suggestion.line_end),
        ) else {
            debug!(
                function_name = %suggestion.function_name,
                line_start = suggestion.line_start,
                line_end = suggestion.line_end,
                "no structural anchor on suggested lines"
            );
            return Vec::new();
        };

        let as_is = self.construct(
            query,
            &suggestion,
            CandidateType::AsIs,
            (start.start_offset(), end.end_offset()),
            None,
        );
        let adjusted = adjust_region(query, start, end).and_then(|(s, e)| {
            let (region, heuristic) = self.reshape(query, (s.start_offset(), e.end_offset()));
            self.construct(query, &suggestion, CandidateType::Adjusted, region, heuristic)
        });

        let mut out = Vec::with_capacity(2);
        match (as_is, adjusted) {
            (Some(_), Some(adjusted)) if self.config.keep_adjusted_only && adjusted.heuristic.is_some() => {
                out.push(adjusted);
            }
            (Some(as_is), Some(adjusted)) => {
                let same_region = (as_is.offset_start, as_is.offset_end)
                    == (adjusted.offset_start, adjusted.offset_end);
                out.push(as_is);
                if !same_region {
                    out.push(adjusted);
                }
            }
            (Some(only), None) | (None, Some(only)) => out.push(only),
            (None, None) => {}
        }
        out
    }

    /// Concatenation of [`Self::build`] over `suggestions`, in order.
    /// Duplicates across suggestions are kept: ranking counts them.
    #[instrument(skip_all, fields(suggestions = suggestions.len()))]
    pub fn build_all<Q: StructuralQuery>(&self, suggestions: &[Suggestion], query: &Q) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = suggestions
            .iter()
            .flat_map(|s| self.build(Arc::new(s.clone()), query))
            .collect();
        debug!(candidates = candidates.len(), "candidates built");
        candidates
    }

    /// Run the enabled heuristics over an ADJUSTED region, in order. The last
    /// one that changes the region names the tag.
    fn reshape<Q: StructuralQuery>(
        &self,
        query: &Q,
        mut region: (usize, usize),
    ) -> ((usize, usize), Option<CandidateHeuristic>) {
        let mut heuristic = None;
        if self.config.if_body {
            if let Some(narrowed) = narrow_to_if_body(query, region) {
                debug!(from = ?region, to = ?narrowed, "region narrowed to if body");
                region = narrowed;
                heuristic = Some(CandidateHeuristic::IfBlock);
            }
        }
        if self.config.prev_assignment {
            if let Some(widened) = widen_to_prev_assignment(query, region) {
                debug!(from = ?region, to = ?widened, "region widened by previous assignment");
                region = widened;
                heuristic = Some(CandidateHeuristic::PrevStatement);
            }
        }
        (region, heuristic)
    }

    fn construct<Q: StructuralQuery>(
        &self,
        query: &Q,
        suggestion: &Arc<Suggestion>,
        candidate_type: CandidateType,
        (offset_start, offset_end): (usize, usize),
        heuristic: Option<CandidateHeuristic>,
    ) -> Option<Candidate> {
        if offset_start > offset_end {
            debug!(?candidate_type, offset_start, offset_end, "inverted region, skipping");
            return None;
        }

        let line_start = query.line_of_offset(offset_start);
        // `offset_end` is exclusive; the last covered byte decides the line.
        let line_end = query.line_of_offset(offset_end.saturating_sub(1).max(offset_start));

        let candidate = Candidate::anchored(
            Arc::clone(suggestion),
            candidate_type,
            (offset_start, offset_end),
            (line_start, line_end),
        )
        .with_heuristic(heuristic);

        if let Some(bounds) = &self.config.size_bounds {
            if let Some(host_lines) = query.host_body_lines(offset_start) {
                if !bounds.admits(candidate.length(), host_lines) {
                    debug!(
                        ?candidate_type,
                        length = candidate.length(),
                        host_lines,
                        "candidate size outside bounds"
                    );
                    return None;
                }
            }
        }

        Some(candidate)
    }
}

fn anchor_at<Q: StructuralQuery>(query: &Q, line: i64) -> Option<Q::Unit> {
    usize::try_from(line)
        .ok()
        .and_then(|line| query.leftmost_unit_at_line(line))
}

/// Enlarge an anchor pair to the smallest region whose two ends are direct
/// children of one common ancestor.
///
/// - An anchor that encloses the other absorbs it.
/// - A single unit is taken relative to its own parent.
/// - Each end is then promoted to the ancestor's child that contains it.
///
/// `None` when the anchors share no ancestor.
pub fn adjust_region<Q: StructuralQuery>(
    query: &Q,
    start: Q::Unit,
    end: Q::Unit,
) -> Option<(Q::Unit, Q::Unit)> {
    let mut ancestor = query.common_ancestor(start, end)?;
    let (mut start, mut end) = (start, end);

    if ancestor == start || ancestor == end {
        start = ancestor;
        end = ancestor;
    }
    if start == end {
        ancestor = start.parent()?;
    }

    Some((query.bubble_up(start, ancestor), query.bubble_up(end, ancestor)))
}

/// When `[start, end)` is exactly one `if` without `else` (plus what it
/// nests), the span of the statements in its body.
pub fn narrow_to_if_body<Q: StructuralQuery>(query: &Q, (start, end): (usize, usize)) -> Option<(usize, usize)> {
    let statements = query.statements_between(start, end);
    let (&first, &last) = (statements.first()?, statements.last()?);
    if !query.is_strict_ancestor(first, last) {
        return None;
    }
    let (body_first, body_last) = query.else_less_if_body(first)?;
    Some((body_first.start_offset(), body_last.end_offset()))
}

/// `[start, end)` extended back over the statement right before it, when that
/// statement sits on the previous line (or the same one) and assigns a
/// variable the region reads.
pub fn widen_to_prev_assignment<Q: StructuralQuery>(
    query: &Q,
    (start, end): (usize, usize),
) -> Option<(usize, usize)> {
    let statements = query.statements_between(start, end);
    let &first = statements.first()?;
    let prev = query.previous_statement(first)?;

    let prev_last_line = query.line_of_offset(prev.end_offset().saturating_sub(1).max(prev.start_offset()));
    if query.line_number(first) > prev_last_line + 1 {
        return None;
    }

    let assigned = query.assigned_names(prev);
    if assigned.is_empty() {
        return None;
    }
    let used = statements
        .iter()
        .any(|&s| query.referenced_names(s).iter().any(|name| assigned.contains(name)));
    used.then_some((prev.start_offset(), end))
}


#[cfg(test)]
mod tests {
    use super::test_tree::{TestTree, TestUnit};
    use super::*;
    use crate::config::SizeBounds;
    use pretty_assertions::assert_eq;

    fn shape(candidates: &[Candidate]) -> Vec<(CandidateType, i64, i64)> {
        candidates
            .iter()
            .map(|c| (c.candidate_type, c.line_start, c.line_end))
            .collect()
    }

    fn build(factory: &CandidateFactory, tree: &TestTree, start: i64, end: i64) -> Vec<Candidate> {
        factory.build(Arc::new(Suggestion::new("extracted", start, end)), &tree)
    }

    #[test]
    fn invalid_suggestion_yields_sentinel() {
        let tree = TestTree::sample();
        let factory = CandidateFactory::default();
        for (s, e) in [(0, 5), (3, 0), (-2, -1)] {
            let out = build(&factory, &tree, s, e);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].candidate_type, CandidateType::Invalid);
            assert_eq!((out[0].offset_start, out[0].offset_end), (-1, -1));
            assert_eq!(out[0].suggestion.line_start, s);
        }
    }

    #[test]
    fn partial_block_is_enlarged_to_enclosing_statement() {
        let tree = TestTree::sample();
        let out = build(&CandidateFactory::default(), &tree, 4, 6);
        assert_eq!(
            shape(&out),
            vec![(CandidateType::AsIs, 4, 6), (CandidateType::Adjusted, 4, 7)]
        );
        assert_eq!((out[0].offset_start, out[0].offset_end), (30, 59));
        assert_eq!((out[1].offset_start, out[1].offset_end), (30, 69));
    }

    #[test]
    fn end_inside_nested_block_bubbles_start_side() {
        let tree = TestTree::sample();
        let out = build(&CandidateFactory::default(), &tree, 6, 8);
        assert_eq!(
            shape(&out),
            vec![(CandidateType::AsIs, 6, 8), (CandidateType::Adjusted, 4, 8)]
        );
    }

    #[test]
    fn sibling_statements_collapse_to_one_candidate() {
        let tree = TestTree::sample();
        let factory = CandidateFactory::default();
        assert_eq!(shape(&build(&factory, &tree, 2, 3)), vec![(CandidateType::AsIs, 2, 3)]);
        assert_eq!(shape(&build(&factory, &tree, 5, 6)), vec![(CandidateType::AsIs, 5, 6)]);
        assert_eq!(shape(&build(&factory, &tree, 5, 5)), vec![(CandidateType::AsIs, 5, 5)]);
    }

    #[test]
    fn unresolvable_line_yields_nothing() {
        let tree = TestTree::sample();
        assert!(build(&CandidateFactory::default(), &tree, 2, 40).is_empty());
    }

    #[test]
    fn inverted_lines_are_dropped() {
        let tree = TestTree::sample();
        assert!(build(&CandidateFactory::default(), &tree, 8, 4).is_empty());
    }

    fn heuristics(if_body: bool, prev_assignment: bool, keep_adjusted_only: bool) -> CandidateFactory {
        CandidateFactory::new(FactoryConfig {
            keep_adjusted_only,
            if_body,
            prev_assignment,
            ..FactoryConfig::default()
        })
    }

    fn tagged(candidates: &[Candidate]) -> Vec<(CandidateType, i64, i64, Option<CandidateHeuristic>)> {
        candidates
            .iter()
            .map(|c| (c.candidate_type, c.line_start, c.line_end, c.heuristic))
            .collect()
    }

    #[test]
    fn keep_adjusted_only_needs_a_heuristic() {
        let tree = TestTree::annotated();
        let plain = heuristics(false, false, true);
        assert_eq!(
            shape(&build(&plain, &tree, 4, 6)),
            vec![(CandidateType::AsIs, 4, 6), (CandidateType::Adjusted, 4, 7)]
        );

        let narrowing = heuristics(true, false, true);
        assert_eq!(
            tagged(&build(&narrowing, &tree, 4, 7)),
            vec![(CandidateType::Adjusted, 5, 6, Some(CandidateHeuristic::IfBlock))]
        );
    }

    #[test]
    fn whole_if_is_narrowed_to_its_body() {
        let tree = TestTree::annotated();
        let factory = heuristics(true, false, false);
        let out = build(&factory, &tree, 4, 7);
        assert_eq!(
            tagged(&out),
            vec![
                (CandidateType::AsIs, 4, 7, None),
                (CandidateType::Adjusted, 5, 6, Some(CandidateHeuristic::IfBlock)),
            ]
        );
        assert_eq!((out[1].offset_start, out[1].offset_end), (40, 59));

        // Something after the `if`, or no `if` at all: region untouched.
        assert_eq!(tagged(&build(&factory, &tree, 4, 8)), vec![(CandidateType::AsIs, 4, 8, None)]);
        assert_eq!(tagged(&build(&factory, &tree, 2, 3)), vec![(CandidateType::AsIs, 2, 3, None)]);
    }

    #[test]
    fn previous_assignment_is_pulled_in() {
        let tree = TestTree::annotated();
        let factory = heuristics(false, true, false);
        let out = build(&factory, &tree, 4, 7);
        assert_eq!(
            tagged(&out),
            vec![
                (CandidateType::AsIs, 4, 7, None),
                (CandidateType::Adjusted, 3, 7, Some(CandidateHeuristic::PrevStatement)),
            ]
        );
        assert_eq!((out[1].offset_start, out[1].offset_end), (20, 69));

        // `e` reads `total`, but its previous statement is the loop, which
        // assigns nothing.
        assert_eq!(tagged(&build(&factory, &tree, 8, 8)), vec![(CandidateType::AsIs, 8, 8, None)]);
    }

    #[test]
    fn heuristics_run_in_order() {
        let tree = TestTree::annotated();
        let out = build(&heuristics(true, true, false), &tree, 4, 7);
        // After narrowing, `c` has no recorded predecessor.
        assert_eq!(out[1].heuristic, Some(CandidateHeuristic::IfBlock));
        assert_eq!(out[1].line_key(), (5, 6));
    }

    /// `x = 1;` on line 2 and `use(x);` on `use_line`.
    fn assignment_then_use(use_line: usize) -> TestTree {
        let mut t = TestTree::default();
        let use_start = (use_line - 1) * 10;
        let root = t.node(0, use_start + 20, None);
        let block = t.node(10, use_start + 10, Some(root));
        let assign = t.node(10, 19, Some(block));
        let read = t.node(use_start, use_start + 9, Some(block));
        t.leftmost(2, assign);
        t.leftmost(use_line, read);
        t.statements(&[assign, read]);
        t.previous(read, assign);
        t.assigns(assign, &["x"]);
        t.reads(read, &["use", "x"]);
        t
    }

    #[test]
    fn previous_assignment_must_be_adjacent() {
        let factory = heuristics(false, true, false);

        let adjacent = assignment_then_use(3);
        assert_eq!(
            tagged(&build(&factory, &adjacent, 3, 3)),
            vec![
                (CandidateType::AsIs, 3, 3, None),
                (CandidateType::Adjusted, 2, 3, Some(CandidateHeuristic::PrevStatement)),
            ]
        );

        let gap = assignment_then_use(4);
        assert_eq!(tagged(&build(&factory, &gap, 4, 4)), vec![(CandidateType::AsIs, 4, 4, None)]);
    }

    #[test]
    fn root_anchor_has_no_adjusted_variant() {
        let tree = TestTree::sample();
        assert_eq!(
            shape(&build(&CandidateFactory::default(), &tree, 1, 1)),
            vec![(CandidateType::AsIs, 1, 10)]
        );
    }

    #[test]
    fn disconnected_anchors_have_no_adjusted_variant() {
        let mut t = TestTree::default();
        let first = t.node(0, 29, None);
        let second = t.node(30, 59, None);
        t.leftmost(1, first);
        t.leftmost(4, second);

        let tree = &t;
        assert!(adjust_region(&tree, first_unit(tree, 1), first_unit(tree, 4)).is_none());
        assert_eq!(
            shape(&build(&CandidateFactory::default(), &t, 1, 4)),
            vec![(CandidateType::AsIs, 1, 6)]
        );
    }

    fn first_unit(tree: &TestTree, line: usize) -> TestUnit<'_> {
        (&tree).leftmost_unit_at_line(line).unwrap()
    }

    #[test]
    fn size_bounds_filter_each_variant() {
        let tree = TestTree::sample().with_body_lines(8);
        let factory = CandidateFactory::new(FactoryConfig {
            size_bounds: Some(SizeBounds::default()),
            ..FactoryConfig::default()
        });
        // 3/8 admitted, 5/8 above 0.60
        assert_eq!(shape(&build(&factory, &tree, 6, 8)), vec![(CandidateType::AsIs, 6, 8)]);
        // 1/8 below 0.14
        assert!(build(&factory, &tree, 5, 5).is_empty());
    }

    #[test]
    fn build_all_concatenates_in_order() {
        let tree = TestTree::sample();
        let suggestions = vec![
            Suggestion::new("a", 4, 6),
            Suggestion::new("b", 0, 0),
            Suggestion::new("c", 2, 3),
            Suggestion::new("d", 2, 3),
        ];
        let out = CandidateFactory::default().build_all(&suggestions, &&tree);
        let names: Vec<&str> = out.iter().map(|c| c.function_name.as_str()).collect();
        assert_eq!(names, vec!["a", "a", "b", "c", "d"]);
    }

    #[test]
    fn common_ancestor_and_bubble_up() {
        let tree = TestTree::sample();
        let q = &tree;
        let c = q.leftmost_unit_at_line(5).unwrap();
        let e = q.leftmost_unit_at_line(8).unwrap();
        let lp = q.leftmost_unit_at_line(4).unwrap();
        let block = lp.parent().unwrap();

        assert_eq!(q.common_ancestor(c, e), Some(block));
        assert_eq!(q.common_ancestor(c, c), Some(c));
        assert_eq!(q.bubble_up(c, block), lp);
        assert_eq!(q.line_number(e), 8);
    }
}
