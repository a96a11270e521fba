//! # Configuration Validation
//!
//! Validation for all configuration structures using the `validator` crate.

use crate::config::Config;
use validator::Validate;

/// Validate configuration structure.
///
/// ## Validation Rules
/// - Quota limits: at least 1 per minute and per day
/// - `circuit.failure_threshold`: 1-1000
/// - `retry.max_attempts`: 1-10
/// - `retry.max_jitter_ms` strictly below `retry.max_delay_ms`
/// - `retry.base_delay_ms` not above `retry.max_delay_ms`
/// - `batch.max_items_per_batch`: 1-100, `batch.concurrency`: 1-16
/// - `conversation.max_stored_turns` at least 2, `conversation.max_sessions` at least 1
/// - `observability.log_level`: trace, debug, info, warn or error
pub fn validate(config: &Config) -> Result<(), validator::ValidationErrors> {
    config.validate()
}
