//! # Configuration Structures
//!
//! All configuration structures for the contract analysis gateway.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization with per-field defaults
//! - Use `validator` for input validation
//! - Express every duration in explicit units (`_ms` / `_secs`)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Top-level configuration aggregating every subsystem section.
///
/// Quota, circuit and backoff constants are operator-tunable inputs; the
/// defaults mirror a conservative free-tier account and are not derived from
/// any algorithmic requirement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// Per-minute and per-day admission limits for the upstream account
    #[serde(default)]
    #[validate(nested)]
    pub quota: QuotaConfig,

    /// Circuit breaker threshold and cooldown
    #[serde(default)]
    #[validate(nested)]
    pub circuit: CircuitConfig,

    /// Retry attempts and backoff bounds
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Clause batching
    #[serde(default)]
    #[validate(nested)]
    pub batch: BatchConfig,

    /// End-to-end analysis pipeline
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    /// Conversation assistant
    #[serde(default)]
    #[validate(nested)]
    pub conversation: ConversationConfig,

    /// Upstream text-generation service
    #[serde(default)]
    #[validate(nested)]
    pub upstream: UpstreamConfig,

    /// Speech synthesis provider
    #[serde(default)]
    #[validate(nested)]
    pub voice: VoiceConfig,

    /// HTTP listener
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Logging
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Admission limits, shared by every request in the process.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct QuotaConfig {
    #[serde(default = "default_requests_per_minute")]
    #[validate(range(min = 1, max = 100_000))]
    pub requests_per_minute: u32,

    #[serde(default = "default_requests_per_day")]
    #[validate(range(min = 1, max = 10_000_000))]
    pub requests_per_day: u32
}

fn default_requests_per_minute() -> u32 {
    50
}

fn default_requests_per_day() -> u32 {
    1200
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_day: default_requests_per_day()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CircuitConfig {
    /// Consecutive upstream failures that open the breaker
    #[serde(default = "default_failure_threshold")]
    #[validate(range(min = 1, max = 1000))]
    pub failure_threshold: u32,

    /// Time the breaker stays open before admitting a trial call
    #[serde(default = "default_cooldown_ms")]
    #[validate(range(min = 1, max = 3_600_000))]
    pub cooldown_ms: u64
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    60_000
}

impl CircuitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms()
        }
    }
}

/// Backoff bounds. Delays stay within `max_delay_ms`, jitter is strictly
/// positive and smaller than the cap.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_retry_bounds"))]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    #[validate(range(min = 1))]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    #[validate(range(min = 1, max = 600_000))]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_jitter_ms")]
    #[validate(range(min = 1))]
    pub max_jitter_ms: u64,

    /// Longest single sleep while waiting for a quota window to reset
    #[serde(default = "default_max_quota_wait_ms")]
    #[validate(range(min = 1))]
    pub max_quota_wait_ms: u64
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_jitter_ms() -> u64 {
    500
}

fn default_max_quota_wait_ms() -> u64 {
    65_000
}

fn validate_retry_bounds(retry: &RetryConfig) -> Result<(), ValidationError> {
    if retry.max_jitter_ms >= retry.max_delay_ms {
        return Err(ValidationError::new("max_jitter_ms must be below max_delay_ms"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(ValidationError::new("base_delay_ms must not exceed max_delay_ms"));
    }
    Ok(())
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_quota_wait_ms: default_max_quota_wait_ms()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BatchConfig {
    #[serde(default = "default_max_items_per_batch")]
    #[validate(range(min = 1, max = 100))]
    pub max_items_per_batch: usize,

    /// Batches of one request allowed in flight at once
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 16))]
    pub concurrency: usize,

    /// Clause text is shortened to this many characters inside batch prompts
    #[serde(default = "default_max_clause_chars")]
    #[validate(range(min = 50, max = 20_000))]
    pub max_clause_chars: usize
}

fn default_max_items_per_batch() -> usize {
    8
}

fn default_concurrency() -> usize {
    1
}

fn default_max_clause_chars() -> usize {
    800
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items_per_batch: default_max_items_per_batch(),
            concurrency: default_concurrency(),
            max_clause_chars: default_max_clause_chars()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PipelineConfig {
    /// Overall deadline for one analysis request
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_secs: u64,

    #[serde(default = "default_min_document_chars")]
    pub min_document_chars: usize,

    #[serde(default = "default_min_clause_chars")]
    #[validate(range(min = 1))]
    pub min_clause_chars: usize,

    /// Clause text kept in the final report
    #[serde(default = "default_excerpt_chars")]
    #[validate(range(min = 20))]
    pub excerpt_chars: usize
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_min_document_chars() -> usize {
    100
}

fn default_min_clause_chars() -> usize {
    50
}

fn default_excerpt_chars() -> usize {
    500
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            min_document_chars: default_min_document_chars(),
            min_clause_chars: default_min_clause_chars(),
            excerpt_chars: default_excerpt_chars()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ConversationConfig {
    /// Turns of history included in each prompt
    #[serde(default = "default_history_turns")]
    #[validate(range(max = 100))]
    pub history_turns: usize,

    #[serde(default = "default_max_message_chars")]
    #[validate(range(min = 1, max = 100_000))]
    pub max_message_chars: usize,

    #[serde(default = "default_reply_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub reply_timeout_secs: u64,

    /// Turns retained per session; older turns are dropped
    #[serde(default = "default_max_stored_turns")]
    #[validate(range(min = 2, max = 10_000))]
    pub max_stored_turns: usize,

    /// Sessions held at once before the least recently active is evicted
    #[serde(default = "default_max_sessions")]
    #[validate(range(min = 1, max = 10_000_000))]
    pub max_sessions: usize,

    /// Idle time after which a session is forgotten
    #[serde(default = "default_session_idle_secs")]
    #[validate(range(min = 1))]
    pub session_idle_secs: u64
}

fn default_history_turns() -> usize {
    10
}

fn default_max_message_chars() -> usize {
    4_000
}

fn default_reply_timeout_secs() -> u64 {
    60
}

fn default_max_stored_turns() -> usize {
    50
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_session_idle_secs() -> u64 {
    3_600
}

impl ConversationConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
            max_message_chars: default_max_message_chars(),
            reply_timeout_secs: default_reply_timeout_secs(),
            max_stored_turns: default_max_stored_turns(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_endpoint")]
    #[validate(length(min = 1, max = 2048))]
    pub endpoint: String,

    #[serde(default = "default_upstream_model")]
    #[validate(length(min = 1, max = 255))]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout; a timed-out call is a transient failure
    #[serde(default = "default_upstream_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    /// Prompts longer than this are compressed before sending
    #[serde(default = "default_max_prompt_chars")]
    #[validate(range(min = 100))]
    pub max_prompt_chars: usize
}

fn default_upstream_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_upstream_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    60
}

fn default_max_prompt_chars() -> usize {
    30_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_upstream_endpoint(),
            model: default_upstream_model(),
            api_key: None,
            request_timeout_secs: default_upstream_timeout_secs(),
            max_prompt_chars: default_max_prompt_chars()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VoiceConfig {
    #[serde(default = "default_tts_endpoint")]
    #[validate(length(min = 1, max = 2048))]
    pub tts_endpoint: String,

    #[serde(default)]
    pub voice_id: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_voice_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64
}

fn default_tts_endpoint() -> String {
    "https://api.elevenlabs.io/v1/text-to-speech".to_string()
}

fn default_voice_timeout_secs() -> u64 {
    30
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_endpoint: default_tts_endpoint(),
            voice_id: None,
            api_key: None,
            request_timeout_secs: default_voice_timeout_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    #[validate(length(min = 1, max = 255))]
    pub bind_address: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Largest accepted upload
    #[serde(default = "default_max_body_bytes")]
    #[validate(range(min = 1024))]
    pub max_body_bytes: usize
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_log_level(value: &str) -> Result<(), ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level()
        }
    }
}
