use super::risk::RiskReport;
use super::simulation::RiskDistribution;
use super::{AgentAdapter, prompts};
use async_trait::async_trait;
use cg_core::{AgentKind, TextGenerator};
use errors::AgentError;
use gateway::Gateway;
use std::sync::Arc;
use tokio::time::Instant;

/// Rule-based summary used when summarizing is skipped or fails.
pub fn fallback_summary(distribution: &RiskDistribution) -> String {
    let analyzed = distribution.analyzed();
    let total = distribution.total();

    if analyzed == 0 {
        return format!(
            "ANALYSIS UNAVAILABLE\n\nRisk analysis could not be completed for any of the {} clauses in this contract, so no summary is available. This does not mean the contract is free of risk. Please try again later.",
            total
        );
    }

    let gaps = if distribution.unavailable > 0 {
        format!(
            "\n\nNote: {} of {} clauses could not be analyzed and are not reflected above.",
            distribution.unavailable, total
        )
    } else {
        String::new()
    };

    if distribution.high * 10 > analyzed * 4 {
        format!(
            "HIGH RISK CONTRACT\n\nThis contract contains {} high-risk clauses out of {} clauses analyzed. We strongly recommend having a lawyer review it before signing; the high-risk areas may expose you to significant legal or financial liability.\n\nKey concerns likely include liability limitations, termination clauses or indemnification requirements. Consider negotiating these terms or seeking legal counsel.{}",
            distribution.high, analyzed, gaps
        )
    } else if distribution.high > 0 {
        format!(
            "MODERATE RISK CONTRACT\n\nThis contract has {} high-risk and {} medium-risk clauses that need attention out of {} clauses analyzed. Review the flagged sections carefully and consider negotiating better terms.\n\nMost of the contract appears standard, but the identified risk areas could affect your rights or obligations.{}",
            distribution.high, distribution.medium, analyzed, gaps
        )
    } else {
        format!(
            "GENERALLY ACCEPTABLE CONTRACT\n\nThis contract appears relatively balanced with {} clauses analyzed. {} clauses deserve some attention, but no major red flags were identified.\n\nRead the document carefully all the same; the overall risk level appears manageable.{}",
            analyzed, distribution.medium, gaps
        )
    }
}

pub struct SummarizationAgent {
    gateway: Arc<Gateway>,
    generator: Arc<dyn TextGenerator>
}

impl SummarizationAgent {
    pub fn new(gateway: Arc<Gateway>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { gateway, generator }
    }
}

#[async_trait]
impl AgentAdapter for SummarizationAgent {
    type Request = RiskReport;
    type Output = String;

    fn kind(&self) -> AgentKind {
        AgentKind::Summarization
    }

    async fn run(&self, report: RiskReport, deadline: Instant) -> Result<String, AgentError> {
        let prompt = prompts::summary(&report.clauses);
        let summary = self
            .gateway
            .execute(deadline, || self.generator.generate(&prompt))
            .await?;
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_summary_wording() {
        let high = RiskDistribution {
            high: 3,
            medium: 1,
            low: 1,
            unavailable: 0
        };
        assert!(fallback_summary(&high).starts_with("HIGH RISK CONTRACT"));

        let moderate = RiskDistribution {
            high: 1,
            medium: 2,
            low: 3,
            unavailable: 4
        };
        let text = fallback_summary(&moderate);
        assert!(text.starts_with("MODERATE RISK CONTRACT"));
        assert!(text.contains("4 of 10 clauses could not be analyzed"));

        let acceptable = RiskDistribution {
            high: 0,
            medium: 2,
            low: 5,
            unavailable: 0
        };
        assert!(fallback_summary(&acceptable).starts_with("GENERALLY ACCEPTABLE"));
    }

    #[test]
    fn test_fallback_summary_when_nothing_analyzed() {
        let none = RiskDistribution {
            high: 0,
            medium: 0,
            low: 0,
            unavailable: 7
        };
        let text = fallback_summary(&none);
        assert!(text.starts_with("ANALYSIS UNAVAILABLE"));
        assert!(text.contains("7 clauses"));
    }
}
