use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("[syntax-anchor] unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("[syntax-anchor] tree-sitter language error")]
    TreeSitterLanguage,

    #[error("[syntax-anchor] tree-sitter parse error")]
    TreeSitterParse,
}

pub type Result<T> = std::result::Result<T, SyntaxError>;
