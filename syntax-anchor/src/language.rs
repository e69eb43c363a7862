//! Supported host languages and their grammars.

use std::path::Path;

use tree_sitter_java as ts_java;
use tree_sitter_javascript as ts_js;
use tree_sitter_python as ts_python;
use tree_sitter_rust as ts_rust;
use tree_sitter_typescript as ts_ts;

use crate::errors::{Result, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Java,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "java" => Some(Self::Java),
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" => Some(Self::JavaScript),
            "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            _ => None,
        }
    }

    /// Language by file extension, or [`SyntaxError::UnsupportedLanguage`].
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| SyntaxError::UnsupportedLanguage(path.display().to_string()))
    }

    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            Self::Rust => ts_rust::LANGUAGE.into(),
            Self::Java => ts_java::LANGUAGE.into(),
            Self::Python => ts_python::LANGUAGE.into(),
            Self::JavaScript => ts_js::LANGUAGE.into(),
            Self::TypeScript => ts_ts::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => ts_ts::LANGUAGE_TSX.into(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
