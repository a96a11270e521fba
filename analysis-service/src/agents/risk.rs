use super::{AgentAdapter, prompts};
use async_trait::async_trait;
use cg_core::{AgentKind, ClauseAssessment, RiskLevel, TextGenerator};
use errors::{AgentError, FailureMarker, UpstreamError};
use gateway::{Gateway, ItemOutcome, WorkBatch};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::time::Instant;

use super::simulation::RiskDistribution;

static SECTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CLAUSE_(\d+)_ANALYSIS\s*:").unwrap());

const HIGH_RISK_PHRASES: [&str; 19] = [
    "indemnify",
    "indemnification",
    "hold harmless",
    "waive",
    "waiver",
    "unlimited liability",
    "personal guarantee",
    "solely responsible",
    "at your own risk",
    "non-compete",
    "restraint of trade",
    "exclusive",
    "irrevocable",
    "perpetual",
    "liquidated damages",
    "penalty",
    "forfeit",
    "termination without cause",
    "immediate termination"
];

const MEDIUM_RISK_PHRASES: [&str; 12] = [
    "reasonable efforts",
    "best efforts",
    "material breach",
    "cure period",
    "payment terms",
    "delivery schedule",
    "intellectual property",
    "confidentiality",
    "warranty",
    "limitation of liability",
    "governing law",
    "arbitration"
];

/// One clause of the analysed document and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseReport {
    /// 1-based position in the document
    pub index: usize,
    pub text: String,
    pub result: ItemOutcome<ClauseAssessment>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskReport {
    pub clauses: Vec<ClauseReport>,
    pub batches: usize,
    pub failed_batches: Vec<usize>
}

impl RiskReport {
    pub fn distribution(&self) -> RiskDistribution {
        RiskDistribution::from_clauses(&self.clauses)
    }

    pub fn analyzed_count(&self) -> usize {
        self.clauses
            .iter()
            .filter(|c| !c.result.is_unavailable())
            .count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.clauses.len() - self.analyzed_count()
    }

    pub fn first_failure(&self) -> Option<&FailureMarker> {
        self.clauses.iter().find_map(|c| match &c.result {
            ItemOutcome::Unavailable(marker) => Some(marker),
            ItemOutcome::Completed(_) => None
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModelAssessment {
    risk_level: String,
    #[serde(alias = "explanation")]
    analysis: String
}

/// Keyword grading used when a clause's section of a readable response is
/// missing or unusable.
pub fn heuristic_assessment(clause: &str) -> ClauseAssessment {
    let lower = clause.to_lowercase();

    if let Some(phrase) = HIGH_RISK_PHRASES.iter().find(|p| lower.contains(*p)) {
        return ClauseAssessment::heuristic(
            RiskLevel::High,
            format!(
                "Contains high-risk language: '{}'. This clause may expose significant legal or financial liability.",
                phrase
            )
        );
    }

    if let Some(phrase) = MEDIUM_RISK_PHRASES.iter().find(|p| lower.contains(*p)) {
        return ClauseAssessment::heuristic(
            RiskLevel::Medium,
            format!(
                "Contains moderate-risk terms: '{}'. Review recommended to ensure acceptable terms.",
                phrase
            )
        );
    }

    ClauseAssessment::heuristic(
        RiskLevel::Low,
        "Standard contractual language with minimal apparent risk factors."
    )
}

fn parse_section(body: &str) -> Option<ClauseAssessment> {
    let start = body.find('{')?;
    let mut stream =
        serde_json::Deserializer::from_str(&body[start..]).into_iter::<ModelAssessment>();
    let parsed = stream.next()?.ok()?;
    let explanation = parsed.analysis.trim();
    if explanation.is_empty() {
        return None;
    }
    Some(ClauseAssessment::from_model(
        RiskLevel::parse_lenient(&parsed.risk_level),
        explanation
    ))
}

/// Maps a batch response back onto the batch's clauses by label.
///
/// Clauses whose section is absent or unparsable are graded heuristically;
/// a response with no readable section at all is malformed.
pub fn parse_batch_response(
    text: &str,
    batch: &WorkBatch<String>
) -> Result<Vec<ClauseAssessment>, UpstreamError> {
    let labels: Vec<(usize, usize, usize)> = SECTION_LABEL
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps[1].parse().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    let mut sections: HashMap<usize, ClauseAssessment> = HashMap::new();
    for (i, (number, _, body_start)) in labels.iter().enumerate() {
        let body_end = labels.get(i + 1).map_or(text.len(), |next| next.1);
        if let Some(assessment) = parse_section(&text[*body_start..body_end]) {
            sections.entry(*number).or_insert(assessment);
        }
    }

    if sections.is_empty() {
        return Err(UpstreamError::malformed("no readable clause sections"));
    }

    let mut fallbacks = 0;
    let assessments = batch
        .items
        .iter()
        .enumerate()
        .map(|(i, clause)| {
            sections.remove(&(batch.offset + i + 1)).unwrap_or_else(|| {
                fallbacks += 1;
                heuristic_assessment(clause)
            })
        })
        .collect();

    if fallbacks > 0 {
        tracing::debug!(
            batch_id = batch.batch_id,
            fallbacks,
            "Clause sections missing from response, graded heuristically"
        );
    }

    Ok(assessments)
}

/// Grades clauses in batches through the gateway.
pub struct RiskAnalysisAgent {
    gateway: Arc<Gateway>,
    generator: Arc<dyn TextGenerator>,
    max_clause_chars: usize
}

impl RiskAnalysisAgent {
    pub fn new(
        gateway: Arc<Gateway>,
        generator: Arc<dyn TextGenerator>,
        max_clause_chars: usize
    ) -> Self {
        Self {
            gateway,
            generator,
            max_clause_chars
        }
    }
}

#[async_trait]
impl AgentAdapter for RiskAnalysisAgent {
    type Request = Vec<String>;
    type Output = RiskReport;

    fn kind(&self) -> AgentKind {
        AgentKind::RiskAnalysis
    }

    /// Never fails: batches that cannot be analysed mark their clauses
    /// unavailable.
    async fn run(&self, clauses: Vec<String>, deadline: Instant) -> Result<RiskReport, AgentError> {
        let max_clause_chars = self.max_clause_chars;
        let generator = &self.generator;

        let report = self
            .gateway
            .schedule_batches(clauses.clone(), deadline, |batch: WorkBatch<String>| {
                let generator = generator.clone();
                async move {
                    let prompt = prompts::risk_batch(&batch, max_clause_chars);
                    let response = generator.generate(&prompt).await?;
                    parse_batch_response(&response, &batch)
                }
            })
            .await;

        let clauses = clauses
            .into_iter()
            .zip(report.results)
            .enumerate()
            .map(|(i, (text, result))| ClauseReport {
                index: i + 1,
                text,
                result
            })
            .collect();

        Ok(RiskReport {
            clauses,
            batches: report.batches,
            failed_batches: report.failed_batches
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_core::AssessmentSource;

    fn batch(offset: usize, items: &[&str]) -> WorkBatch<String> {
        WorkBatch {
            batch_id: 0,
            offset,
            items: items.iter().map(|s| (*s).to_string()).collect()
        }
    }

    #[test]
    fn test_heuristic_grades() {
        assert_eq!(
            heuristic_assessment("The Customer shall indemnify the Supplier.").risk_level,
            RiskLevel::High
        );
        assert_eq!(
            heuristic_assessment("Disputes go to binding arbitration.").risk_level,
            RiskLevel::Medium
        );
        let low = heuristic_assessment("Goods are delivered to the warehouse.");
        assert_eq!(low.risk_level, RiskLevel::Low);
        assert_eq!(low.source, AssessmentSource::Heuristic);
    }

    #[test]
    fn test_parse_batch_response_by_label() {
        let response = r#"
CLAUSE_3_ANALYSIS: {"risk_level": "High", "analysis": "One-sided indemnity."}
CLAUSE_4_ANALYSIS: {"risk_level": "low", "analysis": "Standard notice period."}
"#;
        let assessments = parse_batch_response(response, &batch(2, &["a", "b"])).unwrap();
        assert_eq!(assessments.len(), 2);
        assert_eq!(assessments[0].risk_level, RiskLevel::High);
        assert_eq!(assessments[0].source, AssessmentSource::Model);
        assert_eq!(assessments[1].risk_level, RiskLevel::Low);
        assert_eq!(assessments[1].explanation, "Standard notice period.");
    }

    #[test]
    fn test_parse_tolerates_fences_and_trailing_text() {
        let response = "```\nCLAUSE_1_ANALYSIS:\n```json\n{\"risk_level\": \"Medium\", \"analysis\": \"Vague.\"}\n``` trailing notes";
        let assessments = parse_batch_response(response, &batch(0, &["only clause"])).unwrap();
        assert_eq!(assessments[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_missing_section_falls_back_to_heuristic() {
        let response = r#"CLAUSE_1_ANALYSIS: {"risk_level": "Low", "analysis": "Fine."}"#;
        let assessments = parse_batch_response(
            response,
            &batch(0, &["fine clause", "The tenant waives all claims."])
        )
        .unwrap();
        assert_eq!(assessments[0].source, AssessmentSource::Model);
        assert_eq!(assessments[1].source, AssessmentSource::Heuristic);
        assert_eq!(assessments[1].risk_level, RiskLevel::High);
    }

    #[test]
    fn test_unreadable_response_is_malformed() {
        let err = parse_batch_response("I cannot help with that.", &batch(0, &["x"])).unwrap_err();
        assert!(err.is_transient());

        let err = parse_batch_response("CLAUSE_1_ANALYSIS: not json", &batch(0, &["x"])).unwrap_err();
        assert!(err.reason().contains("no readable clause sections"));
    }
}
