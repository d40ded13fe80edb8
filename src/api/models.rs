//! Request and response bodies for the HTTP API.
//!
//! Every route except `/health` and `/websites` acts on behalf of the caller
//! named in the `X-Harvest-User` header. Task and request documents are
//! returned in their stored camelCase shape.
//!
//! Submitting a custom request (`POST /requests`):
//!
//! ```json
//! {
//!   "websiteUrl": "https://shop.example.com",
//!   "description": "Collect product names and prices",
//!   "email": "me@example.com",
//!   "attachments": [
//!     { "name": "notes.txt", "content": "category pages only" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;
use crate::pagination::Pagination;
use crate::requests::{Attachment, RequestForm};
use crate::tasks::Task;

/// Paging parameters for list endpoints; omitted values fall back to the
/// configured table defaults
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeAccepted {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRequestPayload {
    #[serde(default)]
    pub website_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
}

impl From<CustomRequestPayload> for RequestForm {
    fn from(payload: CustomRequestPayload) -> Self {
        RequestForm {
            website_url: payload.website_url,
            description: payload.description,
            email: payload.email,
            attachments: payload
                .attachments
                .into_iter()
                .map(|a| Attachment::new(a.name, a.content))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
