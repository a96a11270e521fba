//! The end-to-end analysis pipeline.
//!
//! `Extracting -> Analyzing -> Summarizing -> Simulating -> (Translating) -> Done`.
//! Extraction and input validation failures end the run in `Failed`; every
//! later stage degrades to a fallback and the run continues.

use crate::agents::simulation::SimulationReport;
use crate::agents::summary::fallback_summary;
use crate::agents::translation::{TranslationRequest, TranslationResult, language_name};
use crate::agents::{AgentAdapter, Agents, ClauseReport, RiskDistribution, RiskReport};
use crate::telemetry::PipelineTelemetry;
use cg_core::DocumentExtractor;
use config::PipelineConfig;
use errors::{AgentError, FailureMarker, PipelineError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extracting,
    Analyzing,
    Summarizing,
    Simulating,
    Translating,
    Done,
    Failed
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Extracting => "extracting",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Summarizing => "summarizing",
            PipelineStage::Simulating => "simulating",
            PipelineStage::Translating => "translating",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Degraded { failure: FailureMarker },
    Skipped { reason: String }
}

impl StageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StageOutcome::Completed => "completed",
            StageOutcome::Degraded { .. } => "degraded",
            StageOutcome::Skipped { .. } => "skipped"
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, StageOutcome::Completed)
    }
}

/// Progress of one analysis request. Lives only for the request.
#[derive(Debug)]
pub struct PipelineRun {
    stage: PipelineStage,
    partial_results: BTreeMap<PipelineStage, StageOutcome>,
    started: Instant
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            stage: PipelineStage::Extracting,
            partial_results: BTreeMap::new(),
            started: Instant::now()
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(from = self.stage.as_str(), to = stage.as_str(), "Pipeline stage");
        self.stage = stage;
    }

    fn record(&mut self, outcome: StageOutcome) {
        PipelineTelemetry::record_stage(self.stage.as_str(), outcome.label());
        if let StageOutcome::Degraded { failure } = &outcome {
            tracing::warn!(
                stage = self.stage.as_str(),
                code = %failure.code,
                message = %failure.message,
                "Pipeline stage degraded"
            );
        }
        self.partial_results.insert(self.stage, outcome);
    }

    fn fail(&mut self, failure: FailureMarker) {
        self.record(StageOutcome::Degraded { failure });
        self.stage = PipelineStage::Failed;
        PipelineTelemetry::record_duration(self.started.elapsed(), false);
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn degraded_stages(&self) -> Vec<PipelineStage> {
        self.partial_results
            .iter()
            .filter(|(_, outcome)| outcome.is_degraded())
            .map(|(stage, _)| *stage)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub language: Option<String>,
    pub interests: Vec<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    #[serde(flatten)]
    pub outcome: StageOutcome
}

/// Everything a caller gets back from a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub status: PipelineStage,
    pub total_clauses: usize,
    pub analyzed_clauses: usize,
    pub clauses: Vec<ClauseReport>,
    pub distribution: RiskDistribution,
    pub summary: String,
    pub simulation: SimulationReport,
    pub translation: Option<TranslationResult>,
    pub stages: Vec<StageRecord>,
    pub degraded_stages: Vec<PipelineStage>,
    pub contract_excerpt: String,
    pub processing_time_ms: u64
}

impl AnalysisReport {
    pub fn stage_outcome(&self, stage: PipelineStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| &record.outcome)
    }
}

fn degraded(err: &AgentError) -> StageOutcome {
    StageOutcome::Degraded {
        failure: FailureMarker::from(err)
    }
}

pub struct Moderator {
    agents: Arc<Agents>,
    extractor: Arc<dyn DocumentExtractor>,
    request_timeout: Duration,
    excerpt_chars: usize
}

impl Moderator {
    pub fn new(
        config: &PipelineConfig,
        agents: Arc<Agents>,
        extractor: Arc<dyn DocumentExtractor>
    ) -> Self {
        Self {
            agents,
            extractor,
            request_timeout: config.request_timeout(),
            excerpt_chars: config.excerpt_chars
        }
    }

    pub async fn analyze(
        &self,
        document: &[u8],
        options: AnalyzeOptions
    ) -> Result<AnalysisReport, PipelineError> {
        if let Some(language) = &options.language {
            language_name(language)?;
        }

        let deadline = Instant::now() + self.request_timeout;
        let mut run = PipelineRun::new();

        tracing::info!(bytes = document.len(), "Starting contract analysis");

        let clauses = match self.extractor.extract_clauses(document).await {
            Ok(clauses) => clauses,
            Err(err) => {
                run.fail(FailureMarker {
                    code: "EXTRACTION_FAILED".to_string(),
                    message: err.to_string()
                });
                tracing::warn!(error = %err, "Contract extraction failed");
                return Err(err.into());
            }
        };
        run.record(StageOutcome::Completed);
        let contract_text = clauses.join("\n");

        run.enter(PipelineStage::Analyzing);
        let risk = self.analyze_clauses(clauses, deadline).await;
        let distribution = risk.distribution();
        if risk.unavailable_count() == 0 {
            run.record(StageOutcome::Completed);
        } else {
            let failure = risk.first_failure().cloned().unwrap_or_else(|| FailureMarker {
                code: "ANALYSIS_UNAVAILABLE".to_string(),
                message: String::new()
            });
            run.record(StageOutcome::Degraded {
                failure: FailureMarker {
                    code: failure.code,
                    message: format!(
                        "{} of {} clauses unavailable: {}",
                        risk.unavailable_count(),
                        risk.clauses.len(),
                        failure.message
                    )
                }
            });
        }

        run.enter(PipelineStage::Summarizing);
        let summary = if risk.analyzed_count() == 0 {
            run.record(StageOutcome::Skipped {
                reason: "no clause could be analyzed".to_string()
            });
            fallback_summary(&distribution)
        } else {
            match self.agents.summary.run(risk.clone(), deadline).await {
                Ok(summary) if !summary.is_empty() => {
                    run.record(StageOutcome::Completed);
                    summary
                }
                Ok(_) => {
                    run.record(StageOutcome::Degraded {
                        failure: FailureMarker {
                            code: "EMPTY_SUMMARY".to_string(),
                            message: "upstream returned an empty summary".to_string()
                        }
                    });
                    fallback_summary(&distribution)
                }
                Err(err) => {
                    run.record(degraded(&err));
                    fallback_summary(&distribution)
                }
            }
        };

        run.enter(PipelineStage::Simulating);
        let simulation = match self.agents.simulation.run(risk.clone(), deadline).await {
            Ok(simulation) => {
                run.record(StageOutcome::Completed);
                simulation
            }
            Err(err) => {
                run.record(degraded(&err));
                SimulationReport::fallback(&risk)
            }
        };

        let translation = match options.language {
            Some(language) => {
                run.enter(PipelineStage::Translating);
                let request = TranslationRequest {
                    text: contract_text.clone(),
                    language,
                    interests: options.interests
                };
                match self.agents.translation.run(request, deadline).await {
                    Ok(result) => {
                        run.record(StageOutcome::Completed);
                        Some(result)
                    }
                    Err(err) => {
                        run.record(degraded(&err));
                        None
                    }
                }
            }
            None => None
        };

        run.enter(PipelineStage::Done);
        let elapsed = run.started.elapsed();
        PipelineTelemetry::record_duration(elapsed, true);

        let degraded_stages = run.degraded_stages();
        tracing::info!(
            clauses = risk.clauses.len(),
            analyzed = risk.analyzed_count(),
            degraded = degraded_stages.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Contract analysis complete"
        );

        Ok(AnalysisReport {
            status: run.stage(),
            total_clauses: risk.clauses.len(),
            analyzed_clauses: risk.analyzed_count(),
            distribution,
            summary,
            simulation,
            translation,
            stages: run
                .partial_results
                .into_iter()
                .map(|(stage, outcome)| StageRecord { stage, outcome })
                .collect(),
            degraded_stages,
            contract_excerpt: excerpt(&contract_text, self.excerpt_chars),
            processing_time_ms: elapsed.as_millis() as u64,
            clauses: risk.clauses
        })
    }

    async fn analyze_clauses(&self, clauses: Vec<String>, deadline: Instant) -> RiskReport {
        let agent = &self.agents.risk;
        tracing::debug!(agent = %agent.kind(), clauses = clauses.len(), "Dispatching clauses");
        match agent.run(clauses, deadline).await {
            Ok(report) => report,
            Err(err) => {
                // The risk agent degrades per batch and does not fail as a whole.
                tracing::error!(error = %err, "Risk analysis failed outright");
                RiskReport {
                    clauses: Vec::new(),
                    batches: 0,
                    failed_batches: Vec::new()
                }
            }
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}
