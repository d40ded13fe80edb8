use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::docstore::{FieldValue, Fields};

/// One row of scraped (or placeholder) results
pub type ResultRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A data-collection request as stored in the `scrapingTasks` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub website: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Completed and nobody has been told yet
    pub fn awaiting_notification(&self) -> bool {
        self.status == TaskStatus::Completed && !self.notified
    }

    /// Result rows carried in the serialized payload. Empty unless the task
    /// completed with a payload.
    pub fn result_rows(&self) -> Result<Vec<ResultRow>, serde_json::Error> {
        match (&self.status, &self.result) {
            (TaskStatus::Completed, Some(payload)) => serde_json::from_str(payload),
            _ => Ok(Vec::new()),
        }
    }
}

/// Caller-supplied fields for a new task.
///
/// `status` and `notified` are accepted for symmetry with the stored shape
/// but never written: a new task is always `pending` and not notified.
#[derive(Debug, Clone, Default, Builder, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[builder(into)]
    pub website: String,
    #[builder(default)]
    #[serde(default)]
    pub fields: Vec<String>,
    #[builder(into)]
    pub search_term: Option<String>,
    #[builder(into)]
    pub search_location: Option<String>,
    pub results_limit: Option<u32>,
    pub status: Option<TaskStatus>,
    pub notified: Option<bool>,
}

impl NewTask {
    pub(crate) fn into_fields(self, owner: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("userId".into(), FieldValue::of(owner));
        fields.insert("website".into(), FieldValue::of(self.website));
        fields.insert("status".into(), FieldValue::of(TaskStatus::Pending.as_str()));
        fields.insert("notified".into(), FieldValue::of(false));
        fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
        fields.insert("fields".into(), FieldValue::of(self.fields));
        if let Some(term) = self.search_term {
            fields.insert("searchTerm".into(), FieldValue::of(term));
        }
        if let Some(location) = self.search_location {
            fields.insert("searchLocation".into(), FieldValue::of(location));
        }
        if let Some(limit) = self.results_limit {
            fields.insert("resultsLimit".into(), FieldValue::of(limit));
        }
        fields
    }
}

/// Partial update of a task. Ownership cannot be changed and `notified` is
/// only ever set by the completion latch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub website: Option<String>,
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Option<u64>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Store fields for this patch. A completion time is only written when the
    /// patch moves the task to `completed`; without an explicit one the store
    /// clock stamps it.
    pub(crate) fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(website) = self.website {
            fields.insert("website".into(), FieldValue::of(website));
        }
        if let Some(status) = self.status {
            fields.insert("status".into(), FieldValue::of(status.as_str()));
        }
        if self.status == Some(TaskStatus::Completed) {
            let completed_at = match self.completed_at {
                Some(at) => FieldValue::of(at.to_rfc3339()),
                None => FieldValue::ServerTimestamp,
            };
            fields.insert("completedAt".into(), completed_at);
        }
        if let Some(items) = self.items {
            fields.insert("items".into(), FieldValue::of(items));
        }
        if let Some(result) = self.result {
            fields.insert("result".into(), FieldValue::of(result));
        }
        if let Some(error) = self.error {
            fields.insert("error".into(), FieldValue::of(error));
        }
        fields
    }
}

/// Per-status counts for a dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: u64,
}

impl TaskSummary {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut acc, task| {
            acc.total += 1;
            match task.status {
                TaskStatus::Pending => acc.pending += 1,
                TaskStatus::InProgress => acc.in_progress += 1,
                TaskStatus::Completed => acc.completed += 1,
                TaskStatus::Failed => acc.failed += 1,
            }
            acc.items += task.items.unwrap_or(0);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_task_forces_lifecycle_fields() {
        let new = NewTask::builder()
            .website("Amazon")
            .fields(vec!["title".into()])
            .status(TaskStatus::Completed)
            .notified(true)
            .build();

        let fields = new.into_fields("u1");
        assert_eq!(fields["status"], FieldValue::of("pending"));
        assert_eq!(fields["notified"], FieldValue::of(false));
        assert_eq!(fields["createdAt"], FieldValue::ServerTimestamp);
        assert_eq!(fields["userId"], FieldValue::of("u1"));
    }

    #[test]
    fn test_completed_patch_stamps_completion() {
        let fields = TaskPatch::status(TaskStatus::Completed).into_fields();
        assert_eq!(fields["completedAt"], FieldValue::ServerTimestamp);

        let fields = TaskPatch::status(TaskStatus::InProgress).into_fields();
        assert!(!fields.contains_key("completedAt"));
    }

    #[test]
    fn test_explicit_completion_time_is_kept() {
        let at = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let fields = TaskPatch {
            status: Some(TaskStatus::Completed),
            completed_at: Some(at),
            ..Default::default()
        }
        .into_fields();
        assert_eq!(fields["completedAt"], FieldValue::of(at.to_rfc3339()));
    }

    #[test]
    fn test_completion_time_needs_completed_status() {
        let at = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let fields = TaskPatch {
            completed_at: Some(at),
            ..Default::default()
        }
        .into_fields();
        assert!(fields.is_empty());

        let fields = TaskPatch {
            status: Some(TaskStatus::Failed),
            completed_at: Some(at),
            ..Default::default()
        }
        .into_fields();
        assert!(!fields.contains_key("completedAt"));
        assert_eq!(fields["status"], FieldValue::of("failed"));
    }

    #[test]
    fn test_patch_cannot_set_notified() {
        let patch: TaskPatch =
            serde_json::from_value(json!({ "notified": true, "items": 2 })).unwrap();
        assert_eq!(patch.items, Some(2));

        let fields = patch.into_fields();
        assert!(!fields.contains_key("notified"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_task_decodes_from_stored_shape() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "userId": "u1",
            "website": "eBay",
            "status": "in_progress",
            "createdAt": "2024-05-01T10:00:00.000000Z",
        }))
        .unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(!task.notified);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_result_rows_only_for_completed() {
        let mut task: Task = serde_json::from_value(json!({
            "id": "t1", "userId": "u1", "website": "eBay", "status": "pending",
            "createdAt": "2024-05-01T10:00:00Z",
            "result": "[{\"id\":\"result-1\",\"title\":\"x\"}]",
        }))
        .unwrap();
        assert!(task.result_rows().unwrap().is_empty());

        task.status = TaskStatus::Completed;
        let rows = task.result_rows().unwrap();
        assert_eq!(rows[0]["title"], json!("x"));
    }

    #[test]
    fn test_summary_counts() {
        let make = |status: &str, items: u64| -> Task {
            serde_json::from_value(json!({
                "id": "t", "userId": "u", "website": "w", "status": status,
                "createdAt": "2024-05-01T10:00:00Z", "items": items,
            }))
            .unwrap()
        };
        let summary = TaskSummary::from_tasks(&[
            make("pending", 0),
            make("completed", 5),
            make("completed", 3),
            make("failed", 0),
        ]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.items, 8);
    }
}
