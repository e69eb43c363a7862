//! End-to-end extract-function assistant.
//!
//! Glues the tree-sitter structural index (`syntax_anchor`) to the candidate
//! pipeline (`candidate_engine`): parse the host source, turn LLM text into
//! candidates, try each one against the host's transformation service and rank
//! what survives.
//!
//! The transformation service and the LLM transport are supplied by the
//! caller; nothing here talks to the network.

use std::cell::RefCell;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{Level, debug, info, instrument};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use candidate_engine as engine;
pub use syntax_anchor as syntax;

use candidate_engine::multishot::{MultishotAggregator, collect_shots, union_candidates};
use candidate_engine::observer::SharedObserver;
use candidate_engine::ranking::rank;
use candidate_engine::{
    ApplicationPayload, ApplicationRecorder, Candidate, CandidateApplier, CandidateFactory,
    CodeTransformationService, EngineError, MultishotCandidateBundle, MultishotResult,
    LlmResponse, PipelineConfig, RankedCandidate, Suggestion, TracingObserver, parse_suggestions,
};
use syntax_anchor::{Language, SyntaxError, SyntaxIndex};

/// Targets rendered by the formatting layer installed in [`init_tracing`].
const TRACED_TARGETS: &[&str] = &["extract_assist", "candidate_engine", "syntax_anchor"];

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("[extract-assist] failed to read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of one LLM reply over one host source.
#[derive(Debug, Clone, Default)]
pub struct SuggestionReport {
    pub suggestions: Vec<Suggestion>,
    /// Everything the factory built, INVALID sentinels included.
    pub candidates: Vec<Candidate>,
    /// One entry per application attempt, in attempt order.
    pub payloads: Vec<ApplicationPayload>,
    /// Extractable candidates in the configured ranking order.
    pub ranked: Vec<RankedCandidate>,
}

impl SuggestionReport {
    pub fn best(&self) -> Option<&RankedCandidate> {
        self.ranked.first()
    }
}

/// Outcome of several LLM samples over one host source.
#[derive(Debug, Clone, Default)]
pub struct MultishotReport {
    pub bundles: Vec<MultishotCandidateBundle>,
    /// Union of every bundle's extractable candidates, ranked.
    pub ranked: Vec<RankedCandidate>,
}

/// Install a global subscriber: `RUST_LOG` (default `info`) plus a compact
/// formatting layer for this workspace's crates. A second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install_subscriber(filter);
}

/// Like [`init_tracing`], with the candidate engine raised to `level`.
pub fn init_tracing_with_level(level: Level) {
    install_subscriber(engine::telemetry::env_filter_with_level("info", level));
}

fn install_subscriber(filter: EnvFilter) {
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(engine::telemetry::layer_for(TRACED_TARGETS))
        .try_init();
    if installed.is_err() {
        debug!("global tracing subscriber already installed");
    }
}

/// Load `.env` if present, then read [`PipelineConfig`] from `EF_*` variables.
pub fn load_config_from_env() -> Result<PipelineConfig> {
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, ".env not loaded");
    }
    Ok(PipelineConfig::from_env()?)
}

/// Parse `llm_text`, anchor its suggestions in `source`, try them against
/// `service` and rank the extractable ones.
#[instrument(skip_all, fields(language = %language, bytes = source.len()))]
pub fn suggest_from_source<S>(
    source: &str,
    language: Language,
    llm_text: &str,
    service: &mut S,
    config: &PipelineConfig,
) -> Result<SuggestionReport>
where
    S: CodeTransformationService + ?Sized,
{
    config.validate().map_err(EngineError::from)?;
    let index = SyntaxIndex::parse(source, language)?;
    let query = &index;

    let suggestions = parse_suggestions(llm_text);
    let candidates = CandidateFactory::new(config.factory.clone()).build_all(&suggestions, &query);

    let recorder = ApplicationRecorder::shared();
    let applier = CandidateApplier::with_observers([
        recorder.clone() as SharedObserver,
        Rc::new(RefCell::new(TracingObserver)) as SharedObserver,
    ]);
    let extractable = applier.filter_extractable(&candidates, service);
    let ranked = rank(&extractable, &config.ranking);

    info!(
        suggestions = suggestions.len(),
        candidates = candidates.len(),
        extractable = extractable.len(),
        "suggestions processed"
    );

    let payloads = recorder.take().into_payloads();
    Ok(SuggestionReport {
        suggestions,
        candidates,
        payloads,
        ranked,
    })
}

/// [`suggest_from_source`] over a file; the language comes from its extension.
pub fn suggest_from_file<S>(
    path: &Path,
    llm_text: &str,
    service: &mut S,
    config: &PipelineConfig,
) -> Result<SuggestionReport>
where
    S: CodeTransformationService + ?Sized,
{
    let language = Language::from_path(path)?;
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    suggest_from_source(&source, language, llm_text, service, config)
}

/// Run every shot through the pipeline and rank the union of their
/// extractable candidates.
#[instrument(skip_all, fields(language = %language, shots = shots.len()))]
pub fn aggregate_from_source<S>(
    source: &str,
    language: Language,
    shots: &[MultishotResult],
    service: &mut S,
    config: &PipelineConfig,
) -> Result<MultishotReport>
where
    S: CodeTransformationService + ?Sized,
{
    config.validate().map_err(EngineError::from)?;
    let index = SyntaxIndex::parse(source, language)?;
    let query = &index;

    let aggregator = MultishotAggregator::new(config).with_observer(Rc::new(RefCell::new(TracingObserver)));
    let bundles = aggregator.aggregate(shots, &query, service);
    let ranked = rank(&union_candidates(&bundles), &config.ranking);

    info!(bundles = bundles.len(), ranked = ranked.len(), "shots aggregated");
    Ok(MultishotReport { bundles, ranked })
}

/// Top up `existing` to `config.max_shots` samples with `sampler`, then run
/// [`aggregate_from_source`] over the full set.
pub fn sample_and_aggregate<F, E, S>(
    source: &str,
    language: Language,
    existing: Vec<MultishotResult>,
    sampler: F,
    service: &mut S,
    config: &PipelineConfig,
) -> Result<MultishotReport>
where
    F: FnMut(u32) -> std::result::Result<LlmResponse, E>,
    E: Display,
    S: CodeTransformationService + ?Sized,
{
    config.validate().map_err(EngineError::from)?;
    let shots = collect_shots(existing, config, sampler);
    aggregate_from_source(source, language, &shots, service, config)
}
