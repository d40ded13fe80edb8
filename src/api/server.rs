use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{info, warn};

use super::{
    services::{
        create_task, delete_task, export_task, get_task, health, list_requests, list_tasks,
        list_websites, start_scrape, stream_tasks, submit_request, task_results, task_summary,
        update_task,
    },
    state::AppState,
};
use crate::config::Config;
use crate::docstore::{DocumentStore, FjallDocumentStore};
use crate::notify::{Notifier, TracingNotifier};
use crate::storage::StorageClient;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/websites", get(list_websites))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/summary", get(task_summary))
        .route("/tasks/stream", get(stream_tasks))
        .route(
            "/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{task_id}/results", get(task_results))
        .route("/tasks/{task_id}/export", get(export_task))
        .route("/scrape", post(start_scrape))
        .route("/requests", get(list_requests).post(submit_request))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}

/// Open the stores named in `config` and serve until a shutdown signal.
/// `address` overrides `server.bind_addr`.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.data_dir.display(), "Opening document store");
    let store = Arc::new(
        FjallDocumentStore::open(&config.server.data_dir)
            .map_err(|e| format!("Failed to open document store: {}", e))?,
    );

    let storage = if config.exports.in_memory {
        info!("Keeping exports and attachments in memory");
        StorageClient::in_memory()
    } else {
        info!(path = %config.exports.output_dir.display(), "Opening file storage");
        StorageClient::local(&config.exports.output_dir)
            .map_err(|e| format!("Failed to open file storage: {}", e))?
    };

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let documents: Arc<dyn DocumentStore> = store.clone();
    let state = AppState::new(config, documents, storage, notifier);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "DataHarvest API listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store
        .persist()
        .map_err(|e| format!("Failed to flush document store: {}", e))?;
    info!("Document store flushed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
