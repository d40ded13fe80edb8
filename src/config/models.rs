use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::humanize::ByteSize;
use crate::preferences::{Locale, Preferences, Theme};
use crate::tasks::OwnershipCheck;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub exports: ExportsConfig,
    #[serde(default)]
    pub requests: RequestsConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// fjall keyspace holding tasks, custom requests and preferences
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Upper bound for a decoded JSON request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/store")
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize::mib(64)
}

/// Simulated scrape run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Percentage points added per tick
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Rows generated when a run completes
    #[serde(default = "default_placeholder_results")]
    pub placeholder_results: usize,
    #[serde(default = "default_results_limit")]
    pub default_results_limit: u32,
}

impl ScraperConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            progress_step: default_progress_step(),
            progress_interval_ms: default_progress_interval_ms(),
            placeholder_results: default_placeholder_results(),
            default_results_limit: default_results_limit(),
        }
    }
}

fn default_progress_step() -> u8 {
    10
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_placeholder_results() -> usize {
    5
}

fn default_results_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub ownership_check: OwnershipCheck,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportsConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Keep exported files in memory instead of on disk
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            in_memory: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/exports")
}

/// Custom request form limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestsConfig {
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: ByteSize,
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
    /// How many recent requests the sidebar list shows
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment_bytes(),
            max_attachments: default_max_attachments(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_max_attachment_bytes() -> ByteSize {
    ByteSize::mib(10)
}

fn default_max_attachments() -> usize {
    5
}

fn default_recent_limit() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_sibling_count")]
    pub sibling_count: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size_options: default_page_size_options(),
            default_page_size: default_page_size(),
            sibling_count: default_sibling_count(),
        }
    }
}

fn default_page_size_options() -> Vec<usize> {
    vec![5, 10, 25, 50]
}

fn default_page_size() -> usize {
    10
}

fn default_sibling_count() -> usize {
    crate::pagination::DEFAULT_SIBLING_COUNT
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub default_theme: Theme,
    #[serde(default)]
    pub default_locale: Locale,
}

impl PreferencesConfig {
    pub fn defaults(&self) -> Preferences {
        Preferences {
            theme: self.default_theme,
            locale: self.default_locale,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` overrides it
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
