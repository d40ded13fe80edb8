use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DATAHARVEST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/dataharvest.toml";
const ENV_PREFIX: &str = "DATAHARVEST";
const ENV_SEPARATOR: &str = "__";

/// Load configuration with priority (lowest first):
/// struct defaults, TOML file, `.env` file, process environment
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load from a specific file plus environment overrides
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment"
        );
    }

    // DATAHARVEST__SCRAPER__PROGRESS_STEP -> scraper.progress_step
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
