use super::risk::{ClauseReport, RiskReport};
use super::{AgentAdapter, prompts};
use async_trait::async_trait;
use cg_core::{AgentKind, AssessmentSource, RiskLevel, TextGenerator};
use errors::AgentError;
use gateway::Gateway;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unavailable: usize
}

/// Shares of each level over the analysed clauses, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskPercentages {
    pub high: f64,
    pub medium: f64,
    pub low: f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyIndex {
    HighRisk,
    ModerateRisk,
    LowRisk,
    Undetermined
}

impl SafetyIndex {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyIndex::HighRisk => "High Risk",
            SafetyIndex::ModerateRisk => "Moderate Risk",
            SafetyIndex::LowRisk => "Low Risk",
            SafetyIndex::Undetermined => "Undetermined"
        }
    }
}

impl RiskDistribution {
    pub fn from_clauses(clauses: &[ClauseReport]) -> Self {
        let mut distribution = Self::default();
        for clause in clauses {
            match clause.result.completed().map(|a| a.risk_level) {
                Some(RiskLevel::High) => distribution.high += 1,
                Some(RiskLevel::Medium) => distribution.medium += 1,
                Some(RiskLevel::Low) => distribution.low += 1,
                None => distribution.unavailable += 1
            }
        }
        distribution
    }

    pub fn analyzed(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn total(&self) -> usize {
        self.analyzed() + self.unavailable
    }

    pub fn percentages(&self) -> RiskPercentages {
        let analyzed = self.analyzed();
        if analyzed == 0 {
            return RiskPercentages::default();
        }
        let share = |count: usize| count as f64 * 100.0 / analyzed as f64;
        RiskPercentages {
            high: share(self.high),
            medium: share(self.medium),
            low: share(self.low)
        }
    }

    pub fn safety_index(&self) -> SafetyIndex {
        let analyzed = self.analyzed();
        if analyzed == 0 {
            SafetyIndex::Undetermined
        } else if self.high * 2 > analyzed {
            SafetyIndex::HighRisk
        } else if self.medium > 0 && self.medium >= self.high {
            SafetyIndex::ModerateRisk
        } else {
            SafetyIndex::LowRisk
        }
    }
}

/// Rule-based negotiation narrative, keyed on the high-risk count.
pub fn fallback_narrative(distribution: &RiskDistribution) -> String {
    if distribution.analyzed() == 0 {
        return "No negotiation simulation is available because none of the clauses could be analyzed. Try again once the analysis service has recovered.".to_string();
    }

    if distribution.high > 0 {
        format!(
            "NEGOTIATION SIMULATION\n\nIf the {} high-risk clauses were renegotiated to be more balanced, the overall safety index would improve and the contract would expose you to considerably less liability.\n\nKey negotiation points: liability caps, termination notice periods and dispute resolution mechanisms.\n\nRecommendation: start with the highest-risk clauses, as these give the most value from a successful negotiation.",
            distribution.high
        )
    } else {
        "This contract is already well-balanced. Minor improvements could be made to dispute resolution clauses, but overall the agreement is fair to both parties.\n\nTo optimize further, consider adding specific performance metrics, clarifying intellectual property ownership and detailing termination procedures.".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub total_clauses: usize,
    pub distribution: RiskDistribution,
    pub percentages: RiskPercentages,
    pub safety_index: SafetyIndex,
    pub narrative: String,
    pub narrative_source: AssessmentSource
}

impl SimulationReport {
    fn build(distribution: RiskDistribution, narrative: String, source: AssessmentSource) -> Self {
        Self {
            total_clauses: distribution.total(),
            distribution,
            percentages: distribution.percentages(),
            safety_index: distribution.safety_index(),
            narrative,
            narrative_source: source
        }
    }

    /// The report without an upstream narrative.
    pub fn fallback(report: &RiskReport) -> Self {
        let distribution = report.distribution();
        Self::build(
            distribution,
            fallback_narrative(&distribution),
            AssessmentSource::Heuristic
        )
    }
}

pub struct SimulationAgent {
    gateway: Arc<Gateway>,
    generator: Arc<dyn TextGenerator>
}

impl SimulationAgent {
    pub fn new(gateway: Arc<Gateway>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { gateway, generator }
    }
}

#[async_trait]
impl AgentAdapter for SimulationAgent {
    type Request = RiskReport;
    type Output = SimulationReport;

    fn kind(&self) -> AgentKind {
        AgentKind::Simulation
    }

    async fn run(&self, report: RiskReport, deadline: Instant) -> Result<SimulationReport, AgentError> {
        let distribution = report.distribution();
        let safety_index = distribution.safety_index();
        let prompt = prompts::simulation(
            &report.clauses,
            distribution.high,
            distribution.medium,
            distribution.low,
            safety_index.as_str()
        );

        let narrative = self
            .gateway
            .execute(deadline, || self.generator.generate(&prompt))
            .await?;

        Ok(SimulationReport::build(
            distribution,
            narrative.trim().to_string(),
            AssessmentSource::Model
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution(high: usize, medium: usize, low: usize, unavailable: usize) -> RiskDistribution {
        RiskDistribution {
            high,
            medium,
            low,
            unavailable
        }
    }

    #[test]
    fn test_safety_index_rules() {
        assert_eq!(distribution(3, 1, 1, 0).safety_index(), SafetyIndex::HighRisk);
        assert_eq!(distribution(2, 2, 1, 0).safety_index(), SafetyIndex::ModerateRisk);
        assert_eq!(distribution(2, 1, 3, 0).safety_index(), SafetyIndex::LowRisk);
        assert_eq!(distribution(0, 0, 4, 0).safety_index(), SafetyIndex::LowRisk);
        assert_eq!(distribution(0, 0, 0, 6).safety_index(), SafetyIndex::Undetermined);
    }

    #[test]
    fn test_percentages_ignore_unavailable() {
        let percentages = distribution(1, 1, 2, 4).percentages();
        assert_eq!(percentages.high, 25.0);
        assert_eq!(percentages.medium, 25.0);
        assert_eq!(percentages.low, 50.0);
        assert_eq!(distribution(0, 0, 0, 3).percentages(), RiskPercentages::default());
    }

    #[test]
    fn test_fallback_narrative_variants() {
        assert!(fallback_narrative(&distribution(2, 0, 0, 0)).contains("2 high-risk clauses"));
        assert!(fallback_narrative(&distribution(0, 1, 1, 0)).contains("well-balanced"));
        assert!(fallback_narrative(&distribution(0, 0, 0, 5)).contains("none of the clauses"));
    }
}
