use std::sync::Arc;

use crate::config::Config;
use crate::docstore::DocumentStore;
use crate::export::Exporter;
use crate::notify::Notifier;
use crate::observability::Metrics;
use crate::requests::RequestClient;
use crate::storage::StorageClient;
use crate::tasks::TaskStore;

/// Shared handles for every request. Each request works in its own task
/// session (see [`TaskStore::session`]), so `tasks` only carries the store
/// wiring, never a snapshot that requests rely on.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: TaskStore,
    pub requests: RequestClient,
    pub exporter: Exporter,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        storage: StorageClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());

        let tasks = TaskStore::new(store.clone(), notifier.clone())
            .with_ownership_check(config.tasks.ownership_check)
            .with_metrics(metrics.clone());
        let requests = RequestClient::new(store, storage.clone(), notifier.clone(), config.requests.clone())
            .with_metrics(metrics.clone());
        let exporter = Exporter::new(storage, notifier, metrics.clone());

        Self {
            config: Arc::new(config),
            tasks,
            requests,
            exporter,
            metrics,
        }
    }
}
