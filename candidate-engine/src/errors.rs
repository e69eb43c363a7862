//! Unified error handling for `candidate-engine`.
//!
//! Pipeline outcomes (invalid suggestions, unresolvable anchors, rejected
//! extractions) are *values*, never errors. The types here only cover what can
//! genuinely fail: loading/validating configuration and decoding JSON payloads
//! handed to the engine.

use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `candidate-engine` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration/validation errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A JSON document (config file, raw LLM response) could not be decoded.
    #[error("[candidate-engine] json error: {0}")]
    Json(#[from] serde_json::Error),
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Errors raised while reading or validating [`crate::config::PipelineConfig`].
#[non_exhaustive]
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A number failed to parse (ratios, shot counts).
    #[error("[candidate-engine] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `EF_MAX_SHOTS`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Value is syntactically fine but not one of the accepted values.
    #[error("[candidate-engine] invalid value in {var}: {value}")]
    InvalidValue {
        /// Variable name (e.g., `EF_RANKING`).
        var: &'static str,
        /// The rejected raw value.
        value: String,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[candidate-engine] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `size_bounds.min_ratio`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },
}

/* ------------------------------------------------------------------------- */
/* Env helpers                                                               */
/* ------------------------------------------------------------------------- */

/// Reads an optional, non-empty environment variable.
pub(crate) fn env_opt(name: &'static str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub(crate) fn env_opt_u32(name: &'static str) -> std::result::Result<Option<u32>, ConfigError> {
    match env_opt(name) {
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected u32",
        }),
        None => Ok(None),
    }
}

/// Parses an optional `f64` from env (`Ok(None)` if unset/empty).
pub(crate) fn env_opt_f64(name: &'static str) -> std::result::Result<Option<f64>, ConfigError> {
    match env_opt(name) {
        Some(v) => v.parse::<f64>().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected a decimal number",
        }),
        None => Ok(None),
    }
}

/// Parses an optional boolean flag from env. Accepts `1/0`, `true/false`,
/// `yes/no`, `on/off` (case-insensitive).
pub(crate) fn env_opt_bool(name: &'static str) -> std::result::Result<Option<bool>, ConfigError> {
    match env_opt(name) {
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue { var: name, value: v }),
        },
        None => Ok(None),
    }
}
