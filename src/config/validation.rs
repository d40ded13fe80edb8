use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("scraper.progress_step must be between 1 and 100, got {0}")]
    InvalidProgressStep(u8),

    #[error("scraper.progress_interval_ms must be positive")]
    ZeroProgressInterval,

    #[error("scraper.{field} must be positive")]
    ZeroScraperCount { field: &'static str },

    #[error("table.page_size_options must be non-empty and contain no zero")]
    InvalidPageSizeOptions,

    #[error("table.default_page_size {size} is not one of {options:?}")]
    DefaultPageSizeNotOffered { size: usize, options: Vec<usize> },

    #[error("requests.{field} must be positive")]
    ZeroRequestLimit { field: &'static str },

    #[error("server.max_body_bytes must be positive")]
    ZeroBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroBodyLimit);
    }
    validate_scraper(config)?;
    validate_table(config)?;
    validate_requests(config)?;
    Ok(())
}

fn validate_scraper(config: &Config) -> Result<(), ValidationError> {
    let scraper = &config.scraper;

    if !(1..=100).contains(&scraper.progress_step) {
        return Err(ValidationError::InvalidProgressStep(scraper.progress_step));
    }
    if scraper.progress_interval_ms == 0 {
        return Err(ValidationError::ZeroProgressInterval);
    }
    if scraper.placeholder_results == 0 {
        return Err(ValidationError::ZeroScraperCount {
            field: "placeholder_results",
        });
    }
    if scraper.default_results_limit == 0 {
        return Err(ValidationError::ZeroScraperCount {
            field: "default_results_limit",
        });
    }

    Ok(())
}

fn validate_table(config: &Config) -> Result<(), ValidationError> {
    let table = &config.table;

    if table.page_size_options.is_empty() || table.page_size_options.contains(&0) {
        return Err(ValidationError::InvalidPageSizeOptions);
    }
    if !table.page_size_options.contains(&table.default_page_size) {
        return Err(ValidationError::DefaultPageSizeNotOffered {
            size: table.default_page_size,
            options: table.page_size_options.clone(),
        });
    }

    Ok(())
}

fn validate_requests(config: &Config) -> Result<(), ValidationError> {
    if config.requests.max_attachment_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroRequestLimit {
            field: "max_attachment_bytes",
        });
    }
    if config.requests.max_attachments == 0 {
        return Err(ValidationError::ZeroRequestLimit {
            field: "max_attachments",
        });
    }
    if config.requests.recent_limit == 0 {
        return Err(ValidationError::ZeroRequestLimit {
            field: "recent_limit",
        });
    }

    Ok(())
}
