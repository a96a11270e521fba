//! # Configuration System
//!
//! Centralized configuration for the contract analysis gateway.
//!
//! This crate provides:
//! - Configuration structures for quota, circuit breaker, retry, batching,
//!   pipeline, upstream and server settings
//! - Environment variable loading (12-factor app principles)
//! - TOML configuration file loading
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validation;

pub use config::{
    BatchConfig, CircuitConfig, Config, ConversationConfig, ObservabilityConfig, PipelineConfig,
    QuotaConfig, RetryConfig, ServerConfig, UpstreamConfig, VoiceConfig
};
pub use file_loader::{ConfigFileError, load, load_from_toml};
pub use loader::{apply_env_overrides, load_from_env};
pub use validation::validate;
pub use validator::Validate;
