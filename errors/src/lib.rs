//! # Gateway Errors
//!
//! Error taxonomy shared by every crate of the contract analysis system.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields in every display string
//! - Each upstream-facing error carries its own classification so the retry
//!   loop branches on data, never on error-message inspection

use serde::Serialize;
use thiserror::Error;

/// Failure reported by the upstream text-generation service for one call.
///
/// The variant is the classification: `Transient` failures are retried and
/// count toward the circuit breaker, `Fatal` failures are returned at once.
/// A transient failure may carry the upstream's own retry hint (a rate-limit
/// response with `Retry-After`); the retry loop never sleeps less than that.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Transient upstream failure: {reason}")]
    Transient {
        reason: String,
        retry_after_ms: Option<u64>
    },

    #[error("Fatal upstream failure: {reason}")]
    Fatal { reason: String }
}

impl UpstreamError {
    pub fn transient(reason: impl Into<String>) -> Self {
        UpstreamError::Transient {
            reason: reason.into(),
            retry_after_ms: None
        }
    }

    /// Upstream refused the call for quota reasons and said when to come back.
    pub fn rate_limited(reason: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        UpstreamError::Transient {
            reason: reason.into(),
            retry_after_ms
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        UpstreamError::Fatal {
            reason: reason.into()
        }
    }

    /// A response that arrived but could not be parsed into the expected shape.
    pub fn malformed(reason: impl Into<String>) -> Self {
        UpstreamError::Transient {
            reason: format!("malformed response: {}", reason.into()),
            retry_after_ms: None
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            UpstreamError::Transient { reason, .. } | UpstreamError::Fatal { reason } => reason
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            UpstreamError::Transient { retry_after_ms, .. } => *retry_after_ms,
            UpstreamError::Fatal { .. } => None
        }
    }
}

/// Outcome of a gated upstream call that did not produce a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Quota exceeded: retry after {retry_after_ms}ms")]
    QuotaExceeded { retry_after_ms: u64 },

    #[error("Circuit open: retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    #[error("Upstream failed after {attempts} attempts: {reason}")]
    TransientUpstream { reason: String, attempts: u32 },

    #[error("Upstream rejected the request: {reason}")]
    FatalUpstream { reason: String },

    #[error("Deadline exceeded: operation took longer than {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 }
}

impl GatewayError {
    /// Recoverable errors resolve on their own with time; fatal ones do not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GatewayError::FatalUpstream { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            GatewayError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            GatewayError::TransientUpstream { .. } => "UPSTREAM_UNAVAILABLE",
            GatewayError::FatalUpstream { .. } => "UPSTREAM_REJECTED",
            GatewayError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED"
        }
    }
}

/// Document extraction failures. Always terminal for a pipeline run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Document is empty or too short: {length} characters, need {min}")]
    Empty { length: usize, min: usize },

    #[error("Document is unreadable: {reason}")]
    Unreadable { reason: String },

    #[error("No clauses found in document")]
    NoClauses
}

/// Caller input rejected before any upstream resource is consumed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid input: {field} reason: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into()
        }
    }
}

/// Session/history store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session store unavailable: {reason}")]
    Unavailable { reason: String }
}

/// Speech-to-text and text-to-speech collaborator failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Transcription failed: {reason}")]
    Transcription { reason: String },

    #[error("Speech synthesis failed: {reason}")]
    Synthesis { reason: String },

    #[error("Voice provider not configured: {provider}")]
    NotConfigured { provider: String }
}

/// Errors that end a pipeline run before any analysis happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError)
}

/// Failures surfaced by an agent adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Voice(#[from] VoiceError)
}

/// Serializable failure marker used in reports and status payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureMarker {
    pub code: String,
    pub message: String
}

impl From<&GatewayError> for FailureMarker {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string()
        }
    }
}

impl From<&AgentError> for FailureMarker {
    fn from(err: &AgentError) -> Self {
        let code = match err {
            AgentError::Gateway(inner) => inner.code(),
            AgentError::Validation(_) => "VALIDATION_ERROR",
            AgentError::Session(_) => "SESSION_ERROR",
            AgentError::Voice(_) => "VOICE_ERROR"
        };
        Self {
            code: code.to_string(),
            message: err.to_string()
        }
    }
}
