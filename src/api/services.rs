use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{
        CreatedResponse, CustomRequestPayload, ExportQuery, HealthResponse, PageQuery,
        ScrapeAccepted, TaskPage,
    },
    state::AppState,
    utils::{body_error, caller, content_disposition, parse_content_type},
};
use crate::export::ExportFormat;
use crate::pagination::paginate;
use crate::requests::CustomRequest;
use crate::scraper::{ScrapeForm, ScraperSession, WEBSITES, Website};
use crate::table::{Column, TablePage, TableState, render_page};
use crate::tasks::{NewTask, ResultRow, Task, TaskPatch, TaskSummary};

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let components: HashMap<String, String> = ["api", "docstore", "storage"]
        .into_iter()
        .map(|name| (name.to_string(), "healthy".to_string()))
        .collect();

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        metrics: state.metrics.snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Supported websites and the fields each one offers (GET /websites)
pub async fn list_websites() -> Json<&'static [Website]> {
    Json(WEBSITES)
}

/// The caller's tasks, newest first, one page at a time (GET /tasks)
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<TaskPage>, ApiError> {
    let owner = caller(&headers)?;
    let tasks = state.tasks.session().refresh(&owner).await?;
    let table = table_state(&state, &query, tasks.len())?;

    let (page, page_size, total) = (table.current_page(), table.page_size(), tasks.len());
    let pagination = paginate(total, page_size, page, state.config.table.sibling_count);
    let tasks = tasks
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(Json(TaskPage {
        tasks,
        page,
        page_size,
        total,
        pagination,
    }))
}

/// Per-status counts for the caller's tasks (GET /tasks/summary)
pub async fn task_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TaskSummary>, ApiError> {
    let owner = caller(&headers)?;
    let tasks = state.tasks.session().refresh(&owner).await?;
    Ok(Json(TaskSummary::from_tasks(&tasks)))
}

/// Live task list as Server-Sent Events (GET /tasks/stream).
///
/// Every subscription delivery becomes one `snapshot` event carrying the
/// full list. The stream runs its own session, so completions it observes
/// are latched and announced like in any other client.
pub async fn stream_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let owner = caller(&headers)?;
    info!(%owner, "Task stream opened");

    let events = state
        .tasks
        .session()
        .subscribe(Some(&owner))
        .into_stream()
        .map(|delivery| {
            let event = match delivery {
                Ok(tasks) => Event::default()
                    .event("snapshot")
                    .json_data(&tasks)
                    .unwrap_or_else(|err| error_event(err.to_string())),
                Err(err) => error_event(err.to_string()),
            };
            Ok(event)
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn error_event(message: String) -> Event {
    Event::default().event("error").data(message)
}

/// AddTask (POST /tasks)
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let owner = caller(&headers)?;
    let new_task: NewTask = read_json(&state, &headers, body).await?;

    let id = state.tasks.session().add_task(Some(&owner), new_task).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let owner = caller(&headers)?;
    Ok(Json(find_task(&state, &owner, &task_id).await?))
}

/// UpdateTask (PATCH /tasks/{id}); responds with the task as stored afterwards
pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    body: Body,
) -> Result<Json<Task>, ApiError> {
    let owner = caller(&headers)?;
    let patch: TaskPatch = read_json(&state, &headers, body).await?;

    // A fresh session knows nothing until it has read the caller's tasks
    let session = state.tasks.session();
    session.refresh(&owner).await?;
    session.update_task(Some(&owner), &task_id, patch).await?;

    session.refresh(&owner).await?;
    session
        .get_task_by_id(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}

/// DeleteTask (DELETE /tasks/{id})
pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = caller(&headers)?;

    let session = state.tasks.session();
    session.refresh(&owner).await?;
    session.delete_task(Some(&owner), &task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Result rows of a completed task as a paged table (GET /tasks/{id}/results)
pub async fn task_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TablePage>, ApiError> {
    let owner = caller(&headers)?;
    let task = find_task(&state, &owner, &task_id).await?;
    let rows = stored_rows(&task)?;

    let columns: Vec<Column<ResultRow>> = rows
        .first()
        .map(|row| row.keys().map(|key| Column::field(key.as_str(), key.as_str())).collect())
        .unwrap_or_default();
    let table = table_state(&state, &query, rows.len())?;

    Ok(Json(render_page(&columns, &rows, &table)))
}

/// Download a task's results (GET /tasks/{id}/export?format=csv|json|excel)
pub async fn export_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let owner = caller(&headers)?;
    let format: ExportFormat = query.format.as_deref().unwrap_or("csv").parse()?;
    let task = find_task(&state, &owner, &task_id).await?;
    let rows = stored_rows(&task)?;

    let file = state.exporter.export(&task, &rows, format).await?;
    Ok((
        [
            (CONTENT_TYPE, file.format.mime().to_string()),
            (CONTENT_DISPOSITION, content_disposition(&file.filename)),
        ],
        file.content,
    )
        .into_response())
}

/// Start a scrape (POST /scrape).
///
/// The form is validated and the task created before responding; the
/// progress run continues in the background until the task completes.
pub async fn start_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let owner = caller(&headers)?;
    let form: ScrapeForm = read_json(&state, &headers, body).await?;

    let mut session = ScraperSession::new(&state.tasks, Some(owner), state.config.scraper.clone());
    session.fill(form)?;
    let task_id = session.start().await?;

    let run_id = task_id.clone();
    tokio::spawn(async move {
        match session.run().await {
            Ok(phase) => info!(task_id = %run_id, phase = phase.name(), "Background scrape finished"),
            Err(err) => warn!(task_id = %run_id, %err, "Background scrape failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(ScrapeAccepted { task_id })))
}

/// Submit a custom request (POST /requests)
pub async fn submit_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let owner = caller(&headers)?;
    let payload: CustomRequestPayload = read_json(&state, &headers, body).await?;

    let id = state.requests.submit(Some(&owner), payload.into()).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// The caller's most recent custom requests (GET /requests)
pub async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CustomRequest>>, ApiError> {
    let owner = caller(&headers)?;

    let mut recent = state.requests.subscribe_recent(Some(&owner));
    let requests = match recent.next().await {
        Some(delivery) => delivery.map_err(|err| ApiError::Internal(err.to_string()))?,
        None => Vec::new(),
    };
    recent.cancel();

    Ok(Json(requests))
}

/// Looks a task up among the caller's own tasks
async fn find_task(state: &AppState, owner: &str, task_id: &str) -> Result<Task, ApiError> {
    state
        .tasks
        .session()
        .refresh(owner)
        .await?
        .into_iter()
        .find(|task| task.id == task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}

fn stored_rows(task: &Task) -> Result<Vec<ResultRow>, ApiError> {
    task.result_rows().map_err(|err| {
        ApiError::Internal(format!("stored results for task {} are unreadable: {err}", task.id))
    })
}

fn table_state(state: &AppState, query: &PageQuery, total: usize) -> Result<TableState, ApiError> {
    let mut table = TableState::new(&state.config.table);
    if let Some(size) = query.page_size {
        if !table.set_page_size(size) {
            return Err(ApiError::InvalidPayload(format!(
                "page_size {size} is not one of {:?}",
                state.config.table.page_size_options
            )));
        }
    }
    table.go_to(query.page.unwrap_or(1), total);
    Ok(table)
}

/// Reads a JSON body, enforcing Content-Type and the configured size limit.
///
/// Decompression is handled by `RequestDecompressionLayer`, so the limit
/// applies to the decoded body.
async fn read_json<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
) -> Result<T, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let limit = state.config.server.max_body_bytes.as_u64();
    let data = axum::body::to_bytes(body, usize::try_from(limit).unwrap_or(usize::MAX))
        .await
        .map_err(|err| body_error(err, limit))?;

    Ok(serde_json::from_slice(&data)?)
}
