use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Risk grade assigned to one contract clause.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr
)]
pub enum RiskLevel {
    High,
    Medium,
    Low
}

impl RiskLevel {
    /// Parses a model-provided level, case-insensitively.
    ///
    /// Anything unrecognised is graded `Medium` so a sloppy answer never
    /// silently downgrades a clause to `Low`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Medium
        }
    }
}

/// Where an assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Heuristic
}

/// Typed outcome of analysing a single clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseAssessment {
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub source: AssessmentSource
}

impl ClauseAssessment {
    pub fn from_model(risk_level: RiskLevel, explanation: impl Into<String>) -> Self {
        Self {
            risk_level,
            explanation: explanation.into(),
            source: AssessmentSource::Model
        }
    }

    pub fn heuristic(risk_level: RiskLevel, explanation: impl Into<String>) -> Self {
        Self {
            risk_level,
            explanation: explanation.into(),
            source: AssessmentSource::Heuristic
        }
    }
}

/// The closed set of agent capabilities routed through the gateway.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentKind {
    RiskAnalysis,
    Summarization,
    Translation,
    Simulation,
    Conversation
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant
}

/// One message in a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now()
        }
    }
}
