//! Parsed host source plus the line table needed to answer structural
//! queries over it.
//!
//! Anchoring rule for a line: take the smallest node at the first non-blank
//! byte, then climb through ancestors that start and end on that same line,
//! never into a block-like container. The result is the statement (or
//! expression, or keyword) that "owns" the start of the line. A blank line
//! backs up to the last code byte before it and anchors there instead.
//!
//! A statement is any named, non-comment child of a block-like container.

use candidate_engine::{StructuralQuery, StructuralUnit};
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::errors::{Result, SyntaxError};
use crate::language::Language;

/// Containers whose children are independent statements or members.
const BLOCK_KINDS: &[&str] = &[
    "block",
    "statement_block",
    "compound_statement",
    "class_body",
    "constructor_body",
    "declaration_list",
    "enum_body",
    "interface_body",
    "switch_block",
    "switch_body",
    "match_block",
    "source_file",
    "program",
    "module",
];

const COMMENT_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

const IF_KINDS: &[&str] = &["if_statement", "if_expression"];

const DECLARATION_KINDS: &[&str] = &[
    "local_variable_declaration",
    "lexical_declaration",
    "variable_declaration",
];

const ASSIGNMENT_KINDS: &[&str] = &[
    "assignment",
    "assignment_expression",
    "augmented_assignment",
    "augmented_assignment_expression",
    "compound_assignment_expr",
];

const FUNCTION_KINDS: &[&str] = &[
    "function_item",
    "function_definition",
    "function_declaration",
    "method_declaration",
    "method_definition",
    "constructor_declaration",
    "arrow_function",
];

/// Opaque handle over one parse-tree node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntaxUnit<'t>(Node<'t>);

impl SyntaxUnit<'_> {
    /// Grammar kind, e.g. `let_declaration`.
    pub fn kind(&self) -> &'static str {
        self.0.kind()
    }
}

impl StructuralUnit for SyntaxUnit<'_> {
    fn start_offset(&self) -> usize {
        self.0.start_byte()
    }

    fn end_offset(&self) -> usize {
        self.0.end_byte()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent().map(SyntaxUnit)
    }
}

pub struct SyntaxIndex {
    source: String,
    tree: Tree,
    line_starts: Vec<usize>,
    language: Language,
}

impl SyntaxIndex {
    /// Parse `source`. Syntax errors in the source do not fail: tree-sitter
    /// recovers and the damaged region simply anchors worse.
    pub fn parse(source: impl Into<String>, language: Language) -> Result<Self> {
        let source = source.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|_| SyntaxError::TreeSitterLanguage)?;
        let tree = parser
            .parse(&source, None)
            .ok_or(SyntaxError::TreeSitterParse)?;

        if tree.root_node().has_error() {
            debug!(%language, "source parsed with syntax errors");
        }

        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Ok(Self {
            source,
            tree,
            line_starts,
            language,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of the start of a 1-based line.
    pub fn line_start_offset(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)?).copied()
    }

    /// Source text covered by `unit`.
    pub fn text(&self, unit: SyntaxUnit<'_>) -> &str {
        self.source
            .get(unit.start_offset()..unit.end_offset())
            .unwrap_or_default()
    }

    /// Innermost function-like node enclosing `offset`.
    pub fn enclosing_function(&self, offset: usize) -> Option<SyntaxUnit<'_>> {
        let mut node = self
            .tree
            .root_node()
            .descendant_for_byte_range(offset, offset)?;
        loop {
            if FUNCTION_KINDS.contains(&node.kind()) {
                return Some(SyntaxUnit(node));
            }
            node = node.parent()?;
        }
    }

    /// First code byte on `line`; for a blank line, the last code byte
    /// before it. `None` past the last line.
    fn anchor_byte(&self, line: usize) -> Option<usize> {
        let start = self.line_start_offset(line)?;
        if start >= self.source.len() {
            return None;
        }
        let end = self.line_start_offset(line + 1).unwrap_or(self.source.len());
        let bytes = self.source.as_bytes();
        match bytes.get(start..end)?.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(p) => Some(start + p),
            None => bytes.get(..start)?.iter().rposition(|b| !b.is_ascii_whitespace()),
        }
    }

    fn node_text(&self, node: Node<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

fn is_statement(node: Node<'_>) -> bool {
    node.is_named()
        && !COMMENT_KINDS.contains(&node.kind())
        && node.parent().is_some_and(|p| BLOCK_KINDS.contains(&p.kind()))
}

/// The `if` node itself, or the one an expression statement wraps.
fn as_if(node: Node<'_>) -> Option<Node<'_>> {
    if IF_KINDS.contains(&node.kind()) {
        return Some(node);
    }
    if node.kind() != "expression_statement" || node.named_child_count() != 1 {
        return None;
    }
    let mut w = node.walk();
    let inner = node.named_children(&mut w).next()?;
    IF_KINDS.contains(&inner.kind()).then_some(inner)
}

/// Named descendants of `root` (itself included) in document order.
fn named_preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        out.push(n);
        let mut w = n.walk();
        let children: Vec<Node<'_>> = n.named_children(&mut w).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

impl std::fmt::Debug for SyntaxIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxIndex")
            .field("language", &self.language)
            .field("lines", &self.line_starts.len())
            .field("bytes", &self.source.len())
            .finish()
    }
}

impl<'t> StructuralQuery for &'t SyntaxIndex {
    type Unit = SyntaxUnit<'t>;

    fn leftmost_unit_at_line(&self, line: usize) -> Option<Self::Unit> {
        let index: &'t SyntaxIndex = *self;
        let pos = index.anchor_byte(line)?;
        let mut node = index.tree.root_node().descendant_for_byte_range(pos, pos)?;

        let row = node.start_position().row;
        while let Some(prev) = node.prev_sibling() {
            if prev.start_position().row != row {
                break;
            }
            node = prev;
        }

        let end_row = node.end_position().row;
        while let Some(parent) = node.parent() {
            if BLOCK_KINDS.contains(&parent.kind())
                || parent.start_position().row != row
                || parent.end_position().row != end_row
            {
                break;
            }
            node = parent;
        }

        Some(SyntaxUnit(node))
    }

    fn line_of_offset(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    fn host_body_lines(&self, offset: usize) -> Option<usize> {
        let function = self.enclosing_function(offset)?.0;
        let body = function.child_by_field_name("body")?;
        Some(body.end_position().row - body.start_position().row + 1)
    }

    fn statements_between(&self, start: usize, end: usize) -> Vec<Self::Unit> {
        let index: &'t SyntaxIndex = *self;
        let mut out = Vec::new();
        let mut stack = vec![index.tree.root_node()];
        while let Some(n) = stack.pop() {
            if n.end_byte() <= start || n.start_byte() >= end {
                continue;
            }
            if n.start_byte() >= start && n.end_byte() <= end && is_statement(n) {
                out.push(SyntaxUnit(n));
            }
            let mut w = n.walk();
            let children: Vec<Node<'t>> = n.named_children(&mut w).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    fn else_less_if_body(&self, statement: Self::Unit) -> Option<(Self::Unit, Self::Unit)> {
        let if_node = as_if(statement.0)?;
        if if_node.child_by_field_name("alternative").is_some() {
            return None;
        }
        let body = if_node.child_by_field_name("consequence")?;
        if !BLOCK_KINDS.contains(&body.kind()) {
            return Some((SyntaxUnit(body), SyntaxUnit(body)));
        }

        let mut w = body.walk();
        let inner: Vec<Node<'t>> = body
            .named_children(&mut w)
            .filter(|n| !COMMENT_KINDS.contains(&n.kind()))
            .collect();
        Some((SyntaxUnit(*inner.first()?), SyntaxUnit(*inner.last()?)))
    }

    fn previous_statement(&self, statement: Self::Unit) -> Option<Self::Unit> {
        let mut prev = statement.0.prev_named_sibling();
        while let Some(p) = prev {
            if !COMMENT_KINDS.contains(&p.kind()) {
                break;
            }
            prev = p.prev_named_sibling();
        }
        prev.filter(|p| is_statement(*p)).map(SyntaxUnit)
    }

    fn assigned_names(&self, statement: Self::Unit) -> Vec<String> {
        let node = statement.0;
        let kind = node.kind();

        let targets: Vec<Node<'t>> = if DECLARATION_KINDS.contains(&kind) {
            let mut w = node.walk();
            let names: Vec<Node<'t>> = node
                .named_children(&mut w)
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|c| c.child_by_field_name("name"))
                .collect();
            names
        } else if kind == "let_declaration" {
            node.child_by_field_name("pattern")
                .map(named_preorder)
                .unwrap_or_default()
        } else if kind == "expression_statement" {
            let mut w = node.walk();
            let expression = node.named_children(&mut w).next();
            expression
                .filter(|e| ASSIGNMENT_KINDS.contains(&e.kind()))
                .and_then(|e| e.child_by_field_name("left"))
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };

        targets
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .map(|n| self.node_text(n).to_string())
            .collect()
    }

    fn referenced_names(&self, unit: Self::Unit) -> Vec<String> {
        named_preorder(unit.0)
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .map(|n| self.node_text(n).to_string())
            .collect()
    }
}
