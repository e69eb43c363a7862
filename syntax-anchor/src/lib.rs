//! Tree-sitter adapter for `candidate_engine::StructuralQuery`.
//!
//! `&SyntaxIndex` is the query; [`SyntaxUnit`] is the opaque unit handle.
//! Core code never sees `tree_sitter::Node`.

pub mod errors;
pub mod index;
pub mod language;

pub use errors::{Result, SyntaxError};
pub use index::{SyntaxIndex, SyntaxUnit};
pub use language::Language;
