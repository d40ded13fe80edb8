//! Scraper screen
//!
//! [`ScraperSession`] is the state machine behind the scraper form:
//!
//! ```text
//! Configuring -> Submitting -> InProgress -> Completed | Failed -> Configuring
//! ```
//!
//! There is no extraction engine. A run creates a task, advances a cosmetic
//! progress counter on a fixed interval and, at 100%, completes the task with
//! [`placeholder_results`].

pub mod catalog;
mod results;
mod session;

pub use catalog::{WEBSITES, Website};
pub use results::placeholder_results;
pub use session::{Phase, ScrapeForm, ScraperSession};

use thiserror::Error;

use crate::tasks::TaskError;

/// Form problems caught before anything is written
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Select a website to start collecting data")]
    NoWebsite,

    #[error("Unknown website: {0}")]
    UnknownWebsite(String),

    #[error("Select at least one field to collect")]
    NoFields,

    #[error("{website} does not offer the field {field}")]
    UnsupportedField { website: &'static str, field: String },

    #[error("Enter a search term")]
    MissingSearchTerm,

    #[error("Results limit must be a positive whole number, got {0:?}")]
    InvalidResultsLimit(String),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Validation(#[from] FormError),

    #[error("cannot {action} while {phase}")]
    InvalidState {
        action: &'static str,
        phase: &'static str,
    },

    #[error("task store: {0}")]
    Task(#[from] TaskError),

    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
