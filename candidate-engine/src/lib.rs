//! Core of the extract-function assistant.
//!
//! Turns free-form LLM replies into structurally anchored "extract function"
//! candidates, checks each one against a host refactoring engine and ranks
//! the survivors. The host program structure and the refactoring engine are
//! both abstract collaborators:
//! - [`structure::StructuralQuery`] answers anchor/ancestor questions
//! - [`applier::CodeTransformationService`] performs (or rejects) extraction
//!
//! Pipeline, per LLM sample:
//! `parse_suggestions` → [`CandidateFactory::build_all`] →
//! [`CandidateApplier::filter_extractable`] → [`ranking::rank`].
//! [`multishot`] repeats the first three steps per sample.

pub mod applier;
pub mod candidate;
pub mod config;
pub mod errors;
pub mod factory;
pub mod llm;
pub mod multishot;
pub mod observer;
pub mod ranking;
pub mod session;
pub mod structure;
pub mod suggestion;
pub mod telemetry;

pub use applier::{CandidateApplier, CodeTransformationService};
pub use candidate::{
    ApplicationPayload, ApplicationResult, Candidate, CandidateHeuristic, CandidateType,
};
pub use config::{FactoryConfig, PipelineConfig, RankingStrategy, SizeBounds};
pub use errors::{ConfigError, EngineError, Result};
pub use factory::CandidateFactory;
pub use llm::LlmResponse;
pub use multishot::{MultishotCandidateBundle, MultishotResult};
pub use observer::{ApplicationRecorder, Notification, NotificationBus, Observer, TracingObserver};
pub use ranking::{HostSpan, RankedCandidate};
pub use structure::{StructuralQuery, StructuralUnit};
pub use suggestion::{Suggestion, parse_suggestions};
