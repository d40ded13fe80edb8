//! In-process counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for task, scrape and export activity
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_created: AtomicU64,
    tasks_updated: AtomicU64,
    tasks_deleted: AtomicU64,
    tasks_completed: AtomicU64,
    exports_written: AtomicU64,
    requests_submitted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_created(&self) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_created", "Metric incremented");
    }

    pub fn task_updated(&self) {
        self.tasks_updated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_updated", "Metric incremented");
    }

    pub fn task_deleted(&self) {
        self.tasks_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_deleted", "Metric incremented");
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_completed", "Metric incremented");
    }

    pub fn export_written(&self) {
        self.exports_written.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "exports_written", "Metric incremented");
    }

    pub fn request_submitted(&self) {
        self.requests_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_submitted", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            tasks_updated: self.tasks_updated.load(Ordering::Relaxed),
            tasks_deleted: self.tasks_deleted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            exports_written: self.exports_written.load(Ordering::Relaxed),
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_created: u64,
    pub tasks_updated: u64,
    pub tasks_deleted: u64,
    pub tasks_completed: u64,
    pub exports_written: u64,
    pub requests_submitted: u64,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.task_created();
        metrics.task_created();
        metrics.task_completed();
        metrics.export_written();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_created, 2);
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.exports_written, 1);
        assert_eq!(snapshot.tasks_deleted, 0);
    }
}
