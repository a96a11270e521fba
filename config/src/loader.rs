//! # Environment Variable Loader
//!
//! Applies environment variable overrides on top of a base configuration,
//! following 12-factor app principles.
//!
//! # Naming Convention
//! Every variable carries the `CG_` prefix followed by the section name.

use crate::config::Config;
use std::env;

/// Environment variable that points at an optional TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "CG_CONFIG_PATH";

/// Load configuration from environment variables over built-in defaults.
///
/// ## Environment Variables
/// ### Quota
/// - `CG_QUOTA_PER_MINUTE` (default: 50)
/// - `CG_QUOTA_PER_DAY` (default: 1200)
///
/// ### Circuit breaker
/// - `CG_CIRCUIT_FAILURE_THRESHOLD` (default: 5)
/// - `CG_CIRCUIT_COOLDOWN_MS` (default: 60000)
///
/// ### Retry
/// - `CG_RETRY_MAX_ATTEMPTS` (default: 3)
/// - `CG_RETRY_BASE_DELAY_MS` (default: 2000)
/// - `CG_RETRY_MAX_DELAY_MS` (default: 60000)
/// - `CG_RETRY_MAX_JITTER_MS` (default: 500)
/// - `CG_RETRY_MAX_QUOTA_WAIT_MS` (default: 65000)
///
/// ### Batching and pipeline
/// - `CG_BATCH_MAX_ITEMS` (default: 8)
/// - `CG_BATCH_CONCURRENCY` (default: 1)
/// - `CG_PIPELINE_TIMEOUT_SECS` (default: 180)
///
/// ### Conversation
/// - `CG_CONVERSATION_HISTORY_TURNS` (default: 10)
/// - `CG_CONVERSATION_MAX_STORED_TURNS` (default: 50)
/// - `CG_CONVERSATION_MAX_SESSIONS` (default: 10000)
/// - `CG_CONVERSATION_SESSION_IDLE_SECS` (default: 3600)
///
/// ### Upstream and voice
/// - `CG_UPSTREAM_ENDPOINT`, `CG_UPSTREAM_MODEL`, `CG_UPSTREAM_API_KEY`,
///   `CG_UPSTREAM_TIMEOUT_SECS`
/// - `CG_VOICE_TTS_ENDPOINT`, `CG_VOICE_ID`, `CG_VOICE_API_KEY`
///
/// ### Server and logging
/// - `CG_BIND_ADDRESS` (default: "0.0.0.0")
/// - `CG_PORT` (default: 8080)
/// - `CG_LOG_LEVEL` (default: "info")
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Overwrites every field whose environment variable is set.
///
/// Unset variables leave the field untouched; a set but unparseable value is
/// an error rather than a silent fallback.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), Box<dyn std::error::Error>> {
    override_from_env("CG_QUOTA_PER_MINUTE", &mut config.quota.requests_per_minute)?;
    override_from_env("CG_QUOTA_PER_DAY", &mut config.quota.requests_per_day)?;

    override_from_env(
        "CG_CIRCUIT_FAILURE_THRESHOLD",
        &mut config.circuit.failure_threshold
    )?;
    override_from_env("CG_CIRCUIT_COOLDOWN_MS", &mut config.circuit.cooldown_ms)?;

    override_from_env("CG_RETRY_MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
    override_from_env("CG_RETRY_BASE_DELAY_MS", &mut config.retry.base_delay_ms)?;
    override_from_env("CG_RETRY_MAX_DELAY_MS", &mut config.retry.max_delay_ms)?;
    override_from_env("CG_RETRY_MAX_JITTER_MS", &mut config.retry.max_jitter_ms)?;
    override_from_env(
        "CG_RETRY_MAX_QUOTA_WAIT_MS",
        &mut config.retry.max_quota_wait_ms
    )?;

    override_from_env("CG_BATCH_MAX_ITEMS", &mut config.batch.max_items_per_batch)?;
    override_from_env("CG_BATCH_CONCURRENCY", &mut config.batch.concurrency)?;
    override_from_env(
        "CG_PIPELINE_TIMEOUT_SECS",
        &mut config.pipeline.request_timeout_secs
    )?;

    override_from_env(
        "CG_CONVERSATION_HISTORY_TURNS",
        &mut config.conversation.history_turns
    )?;
    override_from_env(
        "CG_CONVERSATION_MAX_STORED_TURNS",
        &mut config.conversation.max_stored_turns
    )?;
    override_from_env(
        "CG_CONVERSATION_MAX_SESSIONS",
        &mut config.conversation.max_sessions
    )?;
    override_from_env(
        "CG_CONVERSATION_SESSION_IDLE_SECS",
        &mut config.conversation.session_idle_secs
    )?;

    override_from_env("CG_UPSTREAM_ENDPOINT", &mut config.upstream.endpoint)?;
    override_from_env("CG_UPSTREAM_MODEL", &mut config.upstream.model)?;
    override_from_env(
        "CG_UPSTREAM_TIMEOUT_SECS",
        &mut config.upstream.request_timeout_secs
    )?;
    if let Ok(key) = env::var("CG_UPSTREAM_API_KEY") {
        config.upstream.api_key = Some(key);
    }

    override_from_env("CG_VOICE_TTS_ENDPOINT", &mut config.voice.tts_endpoint)?;
    if let Ok(voice_id) = env::var("CG_VOICE_ID") {
        config.voice.voice_id = Some(voice_id);
    }
    if let Ok(key) = env::var("CG_VOICE_API_KEY") {
        config.voice.api_key = Some(key);
    }

    override_from_env("CG_BIND_ADDRESS", &mut config.server.bind_address)?;
    override_from_env("CG_PORT", &mut config.server.port)?;
    override_from_env("CG_LOG_LEVEL", &mut config.observability.log_level)?;

    Ok(())
}

fn override_from_env<T>(key: &str, target: &mut T) -> Result<(), Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if env::var_os(key).is_some() {
        *target = parse_env(key)?;
        tracing::debug!(key, "Configuration value overridden from environment");
    }
    Ok(())
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
