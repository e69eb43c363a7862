//! Structural-query seam: what the candidate factory needs to know about the
//! host program's parse tree.
//!
//! Implementations wrap a concrete tree (tree-sitter, a compiler AST, ...)
//! behind an opaque unit handle. Core logic only ever sees offsets, parents
//! and the navigation queries below. The statement-level queries at the end
//! feed the optional factory heuristics; their defaults answer "unknown",
//! which turns those heuristics off.

use std::fmt::Debug;

/// Opaque handle to one structural unit (a parse-tree node).
pub trait StructuralUnit: Copy + PartialEq + Debug {
    /// Inclusive start byte offset.
    fn start_offset(&self) -> usize;
    /// Exclusive end byte offset.
    fn end_offset(&self) -> usize;
    /// Enclosing unit, `None` at the root.
    fn parent(&self) -> Option<Self>;
}

pub trait StructuralQuery {
    type Unit: StructuralUnit;

    /// Leftmost structural unit on a 1-based `line`, or `None` when the line
    /// cannot be resolved (past end of file, empty tail).
    fn leftmost_unit_at_line(&self, line: usize) -> Option<Self::Unit>;

    /// 1-based line containing byte `offset`.
    fn line_of_offset(&self, offset: usize) -> usize;

    /// 1-based line on which `unit` starts.
    fn line_number(&self, unit: Self::Unit) -> usize {
        self.line_of_offset(unit.start_offset())
    }

    /// Deepest unit that is `a` or `b` or encloses both.
    fn common_ancestor(&self, a: Self::Unit, b: Self::Unit) -> Option<Self::Unit> {
        let mut chain = Vec::new();
        let mut cur = Some(a);
        while let Some(u) = cur {
            chain.push(u);
            cur = u.parent();
        }
        let mut cur = Some(b);
        while let Some(u) = cur {
            if chain.contains(&u) {
                return Some(u);
            }
            cur = u.parent();
        }
        None
    }

    /// Climb from `unit` until its parent is `stop` (or the root is reached).
    fn bubble_up(&self, unit: Self::Unit, stop: Self::Unit) -> Self::Unit {
        let mut result = unit;
        while let Some(parent) = result.parent() {
            if parent == stop {
                break;
            }
            result = parent;
        }
        result
    }

    /// Lines in the body of the function enclosing `offset`, when known.
    fn host_body_lines(&self, _offset: usize) -> Option<usize> {
        None
    }

    /// Statements lying entirely inside `[start, end)`, in document order
    /// (an enclosing statement precedes the statements nested in it).
    fn statements_between(&self, _start: usize, _end: usize) -> Vec<Self::Unit> {
        Vec::new()
    }

    /// For an `if` without an `else` branch: the first and last statement of
    /// its body. `None` for anything else, or for an empty body.
    fn else_less_if_body(&self, _statement: Self::Unit) -> Option<(Self::Unit, Self::Unit)> {
        None
    }

    /// Statement immediately preceding `statement` in the same block.
    fn previous_statement(&self, _statement: Self::Unit) -> Option<Self::Unit> {
        None
    }

    /// Variables declared or assigned by `statement`.
    fn assigned_names(&self, _statement: Self::Unit) -> Vec<String> {
        Vec::new()
    }

    /// Identifiers referenced anywhere inside `unit`.
    fn referenced_names(&self, _unit: Self::Unit) -> Vec<String> {
        Vec::new()
    }

    /// Whether `ancestor` strictly encloses `unit` in the tree.
    fn is_strict_ancestor(&self, ancestor: Self::Unit, unit: Self::Unit) -> bool {
        let mut cur = unit.parent();
        while let Some(u) = cur {
            if u == ancestor {
                return true;
            }
            cur = u.parent();
        }
        false
    }
}
