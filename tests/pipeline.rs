use std::path::Path;

use extract_assist::engine::multishot::MultishotResult;
use extract_assist::engine::{
    ApplicationResult, CandidateType, CodeTransformationService, LlmResponse, PipelineConfig,
    SizeBounds,
};
use extract_assist::syntax::{Language, SyntaxError};
use extract_assist::{
    Error, aggregate_from_source, sample_and_aggregate, suggest_from_file, suggest_from_source,
};
use pretty_assertions::assert_eq;

const HOST: &str = "fn host(values: &[i32]) -> i32 {
    let mut total = 0;
    let mut count = 0;
    for v in values {
        total += v;
        count += 1;
    }
    let avg = total / count;
    avg
}
";

/// Accepts a selection only when its braces balance; records every call.
struct BraceBalanceService<'a> {
    source: &'a str,
    calls: Vec<(usize, usize, String)>,
}

impl<'a> BraceBalanceService<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            calls: Vec::new(),
        }
    }
}

impl CodeTransformationService for BraceBalanceService<'_> {
    type Error = String;

    fn extract(&mut self, start: usize, end: usize, name: &str) -> Result<(), String> {
        self.calls.push((start, end, name.to_string()));
        let region = &self.source[start..end];
        if region.matches('{').count() != region.matches('}').count() {
            return Err(format!("cannot extract `{name}`: selection contains unbalanced braces"));
        }
        Ok(())
    }
}

fn lines(ranked: &[extract_assist::engine::RankedCandidate]) -> Vec<(i64, i64)> {
    ranked.iter().map(|r| r.line_key()).collect()
}

#[test]
fn single_reply_end_to_end() {
    let llm_text = r#"Here are some refactoring opportunities:
```
[
  {"function_name": "accumulate", "line_start": 4, "line_end": 6},
  {"function_name": "bad", "line_start": 0, "line_end": 3},
  {"function_name": "init_counters", "line_start": 2, "line_end": 3},
  {"function_name": "sum_values", "line_start": 4, "line_end": 6},
  {"function_name": "ghost", "line_start": 99, "line_end": 120}
]
```"#;
    let mut service = BraceBalanceService::new(HOST);
    let report = suggest_from_source(HOST, Language::Rust, llm_text, &mut service, &PipelineConfig::default()).unwrap();

    assert_eq!(report.suggestions.len(), 5);
    assert_eq!(report.candidates.len(), 6);
    // INVALID never reaches the service.
    assert_eq!(service.calls.len(), 5);

    let outcomes: Vec<(CandidateType, ApplicationResult)> = report
        .payloads
        .iter()
        .map(|p| (p.candidate.candidate_type, p.result))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (CandidateType::AsIs, ApplicationResult::Fail),
            (CandidateType::Adjusted, ApplicationResult::Ok),
            (CandidateType::Invalid, ApplicationResult::Fail),
            (CandidateType::AsIs, ApplicationResult::Ok),
            (CandidateType::AsIs, ApplicationResult::Fail),
            (CandidateType::Adjusted, ApplicationResult::Ok),
        ]
    );
    assert_eq!(report.payloads[2].reason, "invalid extract function candidate");
    assert!(report.payloads[0].reason.contains("unbalanced braces"));

    assert_eq!(lines(&report.ranked), vec![(4, 7), (2, 3)]);
    let best = report.best().unwrap();
    assert_eq!(best.popularity, 2);
    assert_eq!(best.candidate.function_name, "accumulate");
}

#[test]
fn multishot_union_is_ranked_by_heat() {
    let config = PipelineConfig::from_json_str(r#"{"ranking": {"kind": "heat"}}"#).unwrap();
    let shots = vec![
        MultishotResult {
            shot_no: 1,
            processing_time_ms: 812,
            llm_response: Some(LlmResponse::from_text(
                r#"{"function_name": "accumulate", "line_start": 4, "line_end": 6}"#,
            )),
        },
        MultishotResult {
            shot_no: 2,
            processing_time_ms: 640,
            llm_response: Some(LlmResponse::from_text(
                r#"{"function_name": "init", "line_start": 2, "line_end": 3}
                   {"function_name": "tail", "line_start": 6, "line_end": 8}"#,
            )),
        },
        MultishotResult {
            shot_no: 3,
            processing_time_ms: 0,
            llm_response: None,
        },
    ];

    let mut service = BraceBalanceService::new(HOST);
    let report = aggregate_from_source(HOST, Language::Rust, &shots, &mut service, &config).unwrap();

    assert_eq!(report.bundles.len(), 2);
    assert_eq!(report.bundles[0].llm_processing_time_ms, 812);
    assert_eq!(
        report.bundles[1]
            .candidates
            .iter()
            .map(|c| c.line_key())
            .collect::<Vec<_>>(),
        vec![(2, 3), (4, 8)]
    );
    assert_eq!(lines(&report.ranked), vec![(4, 7), (4, 8), (2, 3)]);
    assert_eq!(report.ranked[0].heat, 4);
}

#[test]
fn file_entry_point_reports_io_and_language_errors() {
    let mut service = BraceBalanceService::new(HOST);
    let config = PipelineConfig::default();

    let missing = suggest_from_file(Path::new("does/not/exist.rs"), "", &mut service, &config);
    assert!(matches!(missing, Err(Error::Io { .. })));

    let unsupported = suggest_from_file(Path::new("notes.txt"), "", &mut service, &config);
    assert!(matches!(
        unsupported,
        Err(Error::Syntax(SyntaxError::UnsupportedLanguage(_)))
    ));
}

#[test]
fn file_entry_point_reads_source() {
    let path = std::env::temp_dir().join(format!("extract_assist_host_{}.rs", std::process::id()));
    std::fs::write(&path, HOST).unwrap();

    let mut service = BraceBalanceService::new(HOST);
    let report = suggest_from_file(
        &path,
        r#"{"function_name": "init_counters", "line_start": 2, "line_end": 3}"#,
        &mut service,
        &PipelineConfig::default(),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(lines(&report.ranked), vec![(2, 3)]);
}

#[test]
fn invalid_config_is_rejected_before_parsing() {
    let config = PipelineConfig::from_json_str(r#"{"factory": {"size_bounds": {"min_ratio": 0.7, "max_ratio": 0.2}}}"#);
    assert!(config.is_err());

    let mut config = PipelineConfig::default();
    config.factory.size_bounds = Some(SizeBounds {
        min_ratio: 0.7,
        max_ratio: 0.2,
    });
    let mut service = BraceBalanceService::new(HOST);
    let out = suggest_from_source(HOST, Language::Rust, "", &mut service, &config);
    assert!(matches!(out, Err(Error::Engine(_))));
}

#[test]
fn sampling_tops_up_to_max_shots() {
    let config = PipelineConfig {
        max_shots: 3,
        ..PipelineConfig::default()
    };
    let existing = vec![MultishotResult {
        shot_no: 2,
        processing_time_ms: 90,
        llm_response: Some(LlmResponse::from_text(
            r#"{"function_name": "init", "line_start": 2, "line_end": 3}"#,
        )),
    }];
    let mut sampled = Vec::new();
    let mut service = BraceBalanceService::new(HOST);
    let report = sample_and_aggregate(
        HOST,
        Language::Rust,
        existing,
        |shot_no| {
            sampled.push(shot_no);
            if shot_no == 3 {
                return Err("rate limited");
            }
            Ok(LlmResponse::from_text(
                r#"{"function_name": "accumulate", "line_start": 4, "line_end": 6}"#,
            ))
        },
        &mut service,
        &config,
    )
    .unwrap();

    assert_eq!(sampled, vec![1, 3]);
    assert_eq!(
        report.bundles.iter().map(|b| b.shot_no).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(lines(&report.ranked), vec![(4, 7), (2, 3)]);
}

#[test]
fn sampling_rejects_zero_shots() {
    let config = PipelineConfig {
        max_shots: 0,
        ..PipelineConfig::default()
    };
    let mut calls = 0;
    let mut service = BraceBalanceService::new(HOST);
    let out = sample_and_aggregate(
        HOST,
        Language::Rust,
        Vec::new(),
        |_| {
            calls += 1;
            Ok::<_, String>(LlmResponse::default())
        },
        &mut service,
        &config,
    );
    assert!(matches!(out, Err(Error::Engine(_))));
    assert_eq!(calls, 0);
}
