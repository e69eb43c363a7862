//! Multi-shot aggregation: runs the parse → build → apply pipeline once per
//! LLM sample ("shot") and keeps each shot's extractable candidates.
//!
//! Shots run strictly one after another. The structural index and the
//! transformation service share one mutable source state, so a shot must be
//! fully applied (and rolled back by the service) before the next starts.

use std::collections::HashSet;
use std::fmt::Display;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::applier::{CandidateApplier, CodeTransformationService};
use crate::candidate::{ApplicationPayload, Candidate};
use crate::config::PipelineConfig;
use crate::factory::CandidateFactory;
use crate::llm::LlmResponse;
use crate::observer::{ApplicationRecorder, SharedObserver};
use crate::structure::StructuralQuery;
use crate::suggestion::parse_suggestions;

/// One LLM sampling attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultishotResult {
    /// 1-based.
    pub shot_no: u32,
    pub processing_time_ms: u64,
    pub llm_response: Option<LlmResponse>,
}

/// What one shot contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultishotCandidateBundle {
    pub shot_no: u32,
    /// Candidates the transformation service accepted, in build order.
    pub candidates: Vec<Candidate>,
    /// Every application attempt of this shot, accepted or not.
    pub payloads: Vec<ApplicationPayload>,
    pub llm_response: LlmResponse,
    pub llm_processing_time_ms: u64,
    pub pipeline_processing_time_ms: u64,
}

/// Aggregates shots with a fixed factory configuration and a set of extra
/// observers that see every shot's application stream.
#[derive(Default)]
pub struct MultishotAggregator {
    factory: CandidateFactory,
    observers: Vec<SharedObserver>,
}

impl MultishotAggregator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            factory: CandidateFactory::new(config.factory.clone()),
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    /// One bundle per distinct `shot_no`, in first-appearance order. Only the
    /// first entry of a shot number counts. Shots without a response, without
    /// choices or without a parsable suggestion contribute nothing.
    #[instrument(skip_all, fields(shots = shots.len()))]
    pub fn aggregate<Q, S>(
        &self,
        shots: &[MultishotResult],
        query: &Q,
        service: &mut S,
    ) -> Vec<MultishotCandidateBundle>
    where
        Q: StructuralQuery,
        S: CodeTransformationService + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut bundles = Vec::new();

        for shot in shots {
            if !seen.insert(shot.shot_no) {
                debug!(shot_no = shot.shot_no, "duplicate shot entry ignored");
                continue;
            }
            let Some(response) = &shot.llm_response else {
                debug!(shot_no = shot.shot_no, "shot has no response");
                continue;
            };
            let Some(text) = response.first_text() else {
                debug!(shot_no = shot.shot_no, "shot response has no choices");
                continue;
            };

            let started = Instant::now();
            let suggestions = parse_suggestions(text);
            if suggestions.is_empty() {
                debug!(shot_no = shot.shot_no, "shot produced no suggestions");
                continue;
            }

            let recorder = ApplicationRecorder::shared();
            let mut applier = CandidateApplier::new();
            applier.subscribe(recorder.clone());
            for o in &self.observers {
                applier.subscribe(o.clone());
            }

            let candidates = self.factory.build_all(&suggestions, query);
            let extractable = applier.filter_extractable(&candidates, service);
            let pipeline_ms = elapsed_ms(started);

            let payloads = recorder.take().into_payloads();
            info!(
                shot_no = shot.shot_no,
                suggestions = suggestions.len(),
                candidates = candidates.len(),
                extractable = extractable.len(),
                pipeline_ms,
                "shot processed"
            );

            bundles.push(MultishotCandidateBundle {
                shot_no: shot.shot_no,
                candidates: extractable,
                payloads,
                llm_response: response.clone(),
                llm_processing_time_ms: shot.processing_time_ms,
                pipeline_processing_time_ms: pipeline_ms,
            });
        }

        bundles
    }
}

/// Shorthand for [`MultishotAggregator::aggregate`] without extra observers.
pub fn aggregate<Q, S>(
    shots: &[MultishotResult],
    query: &Q,
    service: &mut S,
    config: &PipelineConfig,
) -> Vec<MultishotCandidateBundle>
where
    Q: StructuralQuery,
    S: CodeTransformationService + ?Sized,
{
    MultishotAggregator::new(config).aggregate(shots, query, service)
}

/// All bundles' extractable candidates, in bundle order. Input for ranking.
pub fn union_candidates(bundles: &[MultishotCandidateBundle]) -> Vec<Candidate> {
    bundles
        .iter()
        .flat_map(|b| b.candidates.iter().cloned())
        .collect()
}

/// Shot numbers in `1..=max_shots` not present in `existing`, ascending.
pub fn missing_shots(existing: &[MultishotResult], max_shots: u32) -> Vec<u32> {
    let present: HashSet<u32> = existing.iter().map(|s| s.shot_no).collect();
    (1..=max_shots).filter(|n| !present.contains(n)).collect()
}

/// Fill shots `1..=config.max_shots` by calling `sampler` once per missing
/// shot number, sequentially. A failed sample is kept as a shot without
/// response.
pub fn collect_shots<F, E>(
    existing: Vec<MultishotResult>,
    config: &PipelineConfig,
    mut sampler: F,
) -> Vec<MultishotResult>
where
    F: FnMut(u32) -> Result<LlmResponse, E>,
    E: Display,
{
    let missing = missing_shots(&existing, config.max_shots);
    let mut shots = existing;

    for shot_no in missing {
        let started = Instant::now();
        let llm_response = match sampler(shot_no) {
            Ok(resp) => Some(resp),
            Err(e) => {
                warn!(shot_no, error = %e, "LLM sample failed");
                None
            }
        };
        shots.push(MultishotResult {
            shot_no,
            processing_time_ms: elapsed_ms(started),
            llm_response,
        });
    }

    shots.sort_by_key(|s| s.shot_no);
    shots
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::candidate::{ApplicationResult, CandidateType};
    use crate::factory::test_tree::TestTree;
    use crate::llm::ResponseChoice;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct AcceptAll {
        calls: usize,
    }

    impl CodeTransformationService for AcceptAll {
        type Error = String;

        fn extract(&mut self, _: usize, _: usize, _: &str) -> Result<(), String> {
            self.calls += 1;
            Ok(())
        }
    }

    fn shot(shot_no: u32, text: Option<&str>) -> MultishotResult {
        MultishotResult {
            shot_no,
            processing_time_ms: 100 * shot_no as u64,
            llm_response: text.map(LlmResponse::from_text),
        }
    }

    #[test]
    fn bundles_only_productive_shots() {
        let tree = TestTree::sample();
        let shots = vec![
            shot(1, Some(r#"{"function_name": "a", "line_start": 4, "line_end": 6}"#)),
            shot(2, None),
            shot(3, Some("nothing to extract here")),
            shot(1, Some(r#"{"function_name": "dup", "line_start": 2, "line_end": 3}"#)),
            MultishotResult {
                shot_no: 4,
                processing_time_ms: 0,
                llm_response: Some(LlmResponse { choices: vec![] }),
            },
            shot(
                5,
                Some(
                    r#"[{"function_name": "bad", "line_start": 0, "line_end": 0},
                        {"function_name": "b", "line_start": 2, "line_end": 3}]"#,
                ),
            ),
        ];
        let mut service = AcceptAll::default();
        let bundles = aggregate(&shots, &&tree, &mut service, &PipelineConfig::default());

        assert_eq!(bundles.iter().map(|b| b.shot_no).collect::<Vec<_>>(), vec![1, 5]);

        let first = &bundles[0];
        assert_eq!(
            first.candidates.iter().map(|c| c.candidate_type).collect::<Vec<_>>(),
            vec![CandidateType::AsIs, CandidateType::Adjusted]
        );
        assert_eq!(first.llm_processing_time_ms, 100);

        let fifth = &bundles[1];
        assert_eq!(fifth.candidates.len(), 1);
        assert_eq!(fifth.payloads.len(), 2);
        assert_eq!(fifth.payloads[0].result, ApplicationResult::Fail);

        // The INVALID candidate never reaches the service.
        assert_eq!(service.calls, 3);
        assert_eq!(union_candidates(&bundles).len(), 3);
    }

    #[test]
    fn extra_observers_see_every_shot() {
        let tree = TestTree::sample();
        let audit = ApplicationRecorder::shared();
        let aggregator = MultishotAggregator::new(&PipelineConfig::default()).with_observer(audit.clone());
        let shots = vec![
            shot(1, Some(r#"{"function_name": "a", "line_start": 2, "line_end": 3}"#)),
            shot(2, Some(r#"{"function_name": "b", "line_start": 5, "line_end": 6}"#)),
        ];
        let bundles = aggregator.aggregate(&shots, &&tree, &mut AcceptAll::default());
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].payloads.len(), 1);
        assert_eq!(audit.borrow().payloads().len(), 2);
    }

    #[test]
    fn missing_shots_are_listed_ascending() {
        let existing = vec![shot(3, None), shot(1, None)];
        assert_eq!(missing_shots(&existing, 5), vec![2, 4, 5]);
        assert!(missing_shots(&existing, 0).is_empty());
    }

    #[test]
    fn collect_fills_gaps_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = calls.clone();
        let config = PipelineConfig {
            max_shots: 3,
            ..PipelineConfig::default()
        };
        let shots = collect_shots(vec![shot(2, Some("kept"))], &config, move |n| {
            log.borrow_mut().push(n);
            if n == 3 {
                Err("timeout")
            } else {
                Ok(LlmResponse {
                    choices: vec![ResponseChoice::new(format!("shot {n}"))],
                })
            }
        });

        assert_eq!(*calls.borrow(), vec![1, 3]);
        assert_eq!(shots.iter().map(|s| s.shot_no).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(shots[0].llm_response.as_ref().and_then(|r| r.first_text()), Some("shot 1"));
        assert_eq!(shots[1].llm_response.as_ref().and_then(|r| r.first_text()), Some("kept"));
        assert!(shots[2].llm_response.is_none());
    }
}
