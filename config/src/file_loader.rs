//! # Configuration File Loading
//!
//! Loads configuration from TOML files and resolves the final configuration
//! with precedence: environment variables > configuration file > defaults.

use crate::config::Config;
use crate::loader::{CONFIG_PATH_ENV, apply_env_overrides};
use std::path::Path;
use validator::Validate;

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Invalid environment override: {0}")]
    Environment(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Load configuration from a TOML file.
///
/// Sections and fields missing from the file take their defaults.
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    let config: Config =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;

    Ok(config)
}

/// Resolve the process configuration.
///
/// Starts from the file at `path` (or `CG_CONFIG_PATH` when `path` is `None`,
/// or defaults when neither is set), applies environment overrides, then
/// validates the result.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigFileError> {
    let env_path = std::env::var(CONFIG_PATH_ENV).ok();
    let resolved = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));

    let mut config = match resolved {
        Some(file) => {
            tracing::info!(path = %file.display(), "Loading configuration file");
            load_from_toml(&file)?
        }
        None => Config::default()
    };

    apply_env_overrides(&mut config).map_err(|e| ConfigFileError::Environment(e.to_string()))?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// See [`load`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        load(path)
    }
}
