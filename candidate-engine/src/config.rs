//! Pipeline configuration.
//!
//! Groups:
//! - [`PipelineConfig`] : top-level container passed explicitly to every stage
//! - [`FactoryConfig`] : candidate construction switches and size bounds
//! - [`RankingStrategy`] : which ordering the final view uses
//!
//! All structs are `serde`-friendly so they can be loaded from JSON. ENV
//! overrides are applied on top of defaults by [`PipelineConfig::from_env`].
//!
//! # Environment variables
//! - `EF_KEEP_ADJUSTED_ONLY` = drop AS_IS when a heuristic reshaped the ADJUSTED candidate (bool)
//! - `EF_IF_BODY` / `EF_PREV_ASSIGNMENT` = enable the ADJUSTED heuristics (bool)
//! - `EF_MIN_SIZE_RATIO` / `EF_MAX_SIZE_RATIO` = enable size bounds (f64, 0..=1)
//! - `EF_RANKING` = `popularity` | `heat` | `size` | `hotspot:<start>-<end>`
//! - `EF_MAX_SHOTS` = number of LLM samples per host function (u32, >= 1)

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ConfigError, Result, env_opt, env_opt_bool, env_opt_f64, env_opt_u32};

/// Top-level configuration for the candidate pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Candidate factory switches.
    pub factory: FactoryConfig,
    /// Ordering used for the final ranked view.
    pub ranking: RankingStrategy,
    /// How many LLM samples ("shots") to collect per host function.
    pub max_shots: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            factory: FactoryConfig::default(),
            ranking: RankingStrategy::Popularity,
            max_shots: 5,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `EF_*` environment variables, then validated.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = env_opt_bool("EF_KEEP_ADJUSTED_ONLY")? {
            cfg.factory.keep_adjusted_only = v;
        }
        if let Some(v) = env_opt_bool("EF_IF_BODY")? {
            cfg.factory.if_body = v;
        }
        if let Some(v) = env_opt_bool("EF_PREV_ASSIGNMENT")? {
            cfg.factory.prev_assignment = v;
        }

        let min = env_opt_f64("EF_MIN_SIZE_RATIO")?;
        let max = env_opt_f64("EF_MAX_SIZE_RATIO")?;
        if min.is_some() || max.is_some() {
            let defaults = SizeBounds::default();
            cfg.factory.size_bounds = Some(SizeBounds {
                min_ratio: min.unwrap_or(defaults.min_ratio),
                max_ratio: max.unwrap_or(defaults.max_ratio),
            });
        }

        if let Some(raw) = env_opt("EF_RANKING") {
            cfg.ranking = raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "EF_RANKING",
                value: raw.clone(),
            })?;
        }

        if let Some(shots) = env_opt_u32("EF_MAX_SHOTS")? {
            cfg.max_shots = shots;
        }

        cfg.validate()?;
        debug!(?cfg, "pipeline config loaded from env");
        Ok(cfg)
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate config sanity (no degenerate or absurd values).
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_shots == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_shots",
                detail: "expected at least 1",
            });
        }
        if let Some(bounds) = &self.factory.size_bounds {
            bounds.validate()?;
        }
        if let RankingStrategy::Hotspot {
            host_line_start,
            host_line_end,
        } = self.ranking
        {
            if host_line_start < 1 || host_line_end < host_line_start {
                return Err(ConfigError::OutOfRange {
                    field: "ranking.host_line_start/host_line_end",
                    detail: "expected 1 <= host_line_start <= host_line_end",
                });
            }
        }
        Ok(())
    }
}

/// Candidate factory switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// When the surviving ADJUSTED candidate was reshaped by a heuristic, do
    /// not emit the AS_IS one.
    pub keep_adjusted_only: bool,
    /// Narrow an ADJUSTED region that is exactly one else-less `if` to the
    /// statements of its body.
    pub if_body: bool,
    /// Widen an ADJUSTED region by the directly preceding statement when that
    /// statement assigns a variable the region reads.
    pub prev_assignment: bool,
    /// Discard candidates that are too small or too large relative to the
    /// host function body. Disabled when `None`.
    pub size_bounds: Option<SizeBounds>,
}

/// Allowed candidate size as a fraction of the host function body lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBounds {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min_ratio: 0.14,
            max_ratio: 0.60,
        }
    }
}

impl SizeBounds {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.min_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "size_bounds.min_ratio",
                detail: "expected 0.0..=1.0",
            });
        }
        if !unit.contains(&self.max_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "size_bounds.max_ratio",
                detail: "expected 0.0..=1.0",
            });
        }
        if self.min_ratio > self.max_ratio {
            return Err(ConfigError::OutOfRange {
                field: "size_bounds",
                detail: "min_ratio must not exceed max_ratio",
            });
        }
        Ok(())
    }

    /// Whether a candidate of `candidate_lines` fits a host body of
    /// `host_body_lines`. An empty host body admits everything.
    pub fn admits(&self, candidate_lines: i64, host_body_lines: usize) -> bool {
        if host_body_lines == 0 {
            return true;
        }
        let ratio = candidate_lines as f64 / host_body_lines as f64;
        ratio >= self.min_ratio && ratio <= self.max_ratio
    }
}

/// Ordering used for a ranked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingStrategy {
    Popularity,
    Heat,
    Size,
    /// Line heat map over the host function, weighted by popularity.
    Hotspot {
        host_line_start: i64,
        host_line_end: i64,
    },
}

impl FromStr for RankingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            var: "ranking",
            value: s.to_string(),
        };
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "popularity" => Ok(Self::Popularity),
            "heat" => Ok(Self::Heat),
            "size" => Ok(Self::Size),
            other => {
                let range = other.strip_prefix("hotspot:").ok_or_else(invalid)?;
                let (start, end) = range.split_once('-').ok_or_else(invalid)?;
                Ok(Self::Hotspot {
                    host_line_start: start.trim().parse().map_err(|_| invalid())?,
                    host_line_end: end.trim().parse().map_err(|_| invalid())?,
                })
            }
        }
    }
}
