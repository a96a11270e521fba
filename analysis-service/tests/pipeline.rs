mod common;

use analysis_service::{AnalyzeOptions, PipelineStage, StageOutcome};
use analysis_service::agents::SafetyIndex;
use cg_core::{AssessmentSource, RiskLevel};
use common::*;
use errors::{ExtractionError, PipelineError, UpstreamError};
use std::sync::Arc;
use testing::{ScriptedGenerator, sample_contract, short_document};

#[tokio::test(start_paused = true)]
async fn test_healthy_run_completes_every_stage() {
    let generator = healthy_generator();
    let state = app_state(&test_config(), generator.clone());

    let report = state
        .moderator
        .analyze(
            sample_contract().as_bytes(),
            AnalyzeOptions {
                language: Some("fr".to_string()),
                interests: vec!["payment_terms".to_string(), "horoscopes".to_string()]
            }
        )
        .await
        .unwrap();

    assert_eq!(report.status, PipelineStage::Done);
    assert_eq!(report.total_clauses, 10);
    assert_eq!(report.analyzed_clauses, 10);
    assert!(report.degraded_stages.is_empty());
    assert_eq!(report.stages.len(), 5);

    let third = report.clauses[2].result.completed().unwrap();
    assert_eq!(third.risk_level, RiskLevel::High);
    assert_eq!(third.source, AssessmentSource::Model);
    assert_eq!(report.distribution.high, 1);
    assert_eq!(report.distribution.low, 9);

    assert_eq!(report.summary, SUMMARY_REPLY);
    assert_eq!(report.simulation.narrative, SIMULATION_REPLY);
    assert_eq!(report.simulation.safety_index, SafetyIndex::LowRisk);

    let translation = report.translation.unwrap();
    assert_eq!(translation.language_name, "French");
    assert_eq!(translation.interests, vec!["payment_terms"]);
    assert_eq!(translation.sections.len(), 2);

    // three risk batches, summary, simulation, translation
    assert_eq!(generator.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_marks_only_its_clauses_unavailable() {
    let generator = Arc::new(ScriptedGenerator::responding(|prompt| {
        if clause_numbers(prompt).contains(&5) {
            Err(UpstreamError::transient("503 Service Unavailable"))
        } else {
            healthy_reply(prompt)
        }
    }));
    let state = app_state(&test_config(), generator.clone());

    let report = state
        .moderator
        .analyze(sample_contract().as_bytes(), AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(report.clauses.len(), 10);
    for clause in &report.clauses {
        let unavailable = (5..=8).contains(&clause.index);
        assert_eq!(clause.result.is_unavailable(), unavailable, "clause {}", clause.index);
    }
    assert_eq!(report.analyzed_clauses, 6);
    assert_eq!(report.distribution.unavailable, 4);

    assert_eq!(report.degraded_stages, vec![PipelineStage::Analyzing]);
    match report.stage_outcome(PipelineStage::Analyzing) {
        Some(StageOutcome::Degraded { failure }) => {
            assert_eq!(failure.code, "UPSTREAM_UNAVAILABLE");
            assert!(failure.message.starts_with("4 of 10 clauses unavailable"));
        }
        other => panic!("unexpected analyzing outcome: {:?}", other)
    }
    assert_eq!(report.summary, SUMMARY_REPLY);
    assert_eq!(report.status, PipelineStage::Done);

    // batch 1, three attempts at batch 2, batch 3, summary, simulation
    assert_eq!(generator.calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_total_outage_skips_summary_and_uses_fallbacks() {
    let generator = Arc::new(ScriptedGenerator::failing(UpstreamError::transient(
        "connection reset"
    )));
    let state = app_state(&test_config(), generator.clone());

    let report = state
        .moderator
        .analyze(sample_contract().as_bytes(), AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, PipelineStage::Done);
    assert_eq!(report.analyzed_clauses, 0);
    assert!(report.clauses.iter().all(|c| c.result.is_unavailable()));
    assert!(report.summary.starts_with("ANALYSIS UNAVAILABLE"));
    assert!(matches!(
        report.stage_outcome(PipelineStage::Summarizing),
        Some(StageOutcome::Skipped { .. })
    ));

    // the breaker opened during the second batch; simulation short-circuits
    match report.stage_outcome(PipelineStage::Simulating) {
        Some(StageOutcome::Degraded { failure }) => assert_eq!(failure.code, "CIRCUIT_OPEN"),
        other => panic!("unexpected simulating outcome: {:?}", other)
    }
    assert_eq!(report.simulation.safety_index, SafetyIndex::Undetermined);
    assert_eq!(report.simulation.narrative_source, AssessmentSource::Heuristic);
    assert_eq!(
        report.degraded_stages,
        vec![
            PipelineStage::Analyzing,
            PipelineStage::Summarizing,
            PipelineStage::Simulating
        ]
    );
    assert_eq!(generator.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_summary_failure_falls_back() {
    let generator = Arc::new(ScriptedGenerator::responding(|prompt| {
        if prompt.contains("plain language for non-lawyers") {
            Err(UpstreamError::fatal("400 Bad Request"))
        } else {
            healthy_reply(prompt)
        }
    }));
    let state = app_state(&test_config(), generator.clone());

    let report = state
        .moderator
        .analyze(sample_contract().as_bytes(), AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(report.degraded_stages, vec![PipelineStage::Summarizing]);
    match report.stage_outcome(PipelineStage::Summarizing) {
        Some(StageOutcome::Degraded { failure }) => assert_eq!(failure.code, "UPSTREAM_REJECTED"),
        other => panic!("unexpected summarizing outcome: {:?}", other)
    }
    assert!(report.summary.starts_with("MODERATE RISK CONTRACT"));
    assert_eq!(report.simulation.narrative, SIMULATION_REPLY);
}

#[tokio::test(start_paused = true)]
async fn test_quota_pressure_delays_but_completes() {
    let mut config = test_config();
    config.quota.requests_per_minute = 2;
    let generator = healthy_generator();
    let state = app_state(&config, generator.clone());

    let report = state
        .moderator
        .analyze(sample_contract().as_bytes(), AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(report.analyzed_clauses, 10);
    assert!(report.degraded_stages.is_empty());
    // five calls at two per minute need two window resets
    assert!(report.processing_time_ms >= 120_000);
    assert_eq!(generator.calls(), 5);
    assert!(state.gateway.status().stats.quota_waits >= 2);
}

#[tokio::test]
async fn test_extraction_failure_is_terminal() {
    let generator = healthy_generator();
    let state = app_state(&test_config(), generator.clone());

    let err = state
        .moderator
        .analyze(short_document().as_bytes(), AnalyzeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Extraction(ExtractionError::Empty { .. })
    ));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_language_rejected_before_upstream() {
    let generator = healthy_generator();
    let state = app_state(&test_config(), generator.clone());

    let err = state
        .moderator
        .analyze(
            sample_contract().as_bytes(),
            AnalyzeOptions {
                language: Some("tlh".to_string()),
                interests: Vec::new()
            }
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(generator.calls(), 0);
}
