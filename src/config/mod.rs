//! Layered configuration
//!
//! Settings are merged from, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML file, `config/dataharvest.toml` unless `DATAHARVEST_CONFIG` points elsewhere
//! 3. `.env` file
//! 4. Environment variables `DATAHARVEST__<section>__<key>`
//!
//! Examples:
//! - `DATAHARVEST__SERVER__BIND_ADDR=127.0.0.1:9000`
//! - `DATAHARVEST__TASKS__OWNERSHIP_CHECK=authoritative`
//! - `DATAHARVEST__REQUESTS__MAX_ATTACHMENT_BYTES=5MB`

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, ExportsConfig, PreferencesConfig, RequestsConfig, ScraperConfig, ServerConfig,
    TableConfig, TasksConfig, TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load and validate configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from a specific file (plus environment overrides)
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[scraper]\nprogress_interval_ms = 20\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.scraper.progress_interval_ms, 20);
        assert_eq!(config.scraper.progress_step, 10);
    }

    #[test]
    fn test_validation_runs_after_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[table]\ndefault_page_size = 7\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(
                ValidationError::DefaultPageSizeNotOffered { size: 7, .. }
            ))
        ));
    }
}
