use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{NewTask, Task, TaskPatch};
use super::subscription::TaskSubscription;
use crate::docstore::{
    Collection, Direction, DocumentStore, FieldValue, Fields, Precondition, Query, StoreError,
    Subscription,
};
use crate::notify::{Notification, Notifier};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("permission denied for task {0}")]
    PermissionDenied(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Where update/delete look up the task owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipCheck {
    /// Last snapshot delivered to this client (a task created elsewhere and
    /// not yet delivered is rejected)
    #[default]
    LocalSnapshot,
    /// Re-read the task from the store at mutation time
    Authoritative,
}

/// Owner-scoped client over the `scrapingTasks` collection.
///
/// One instance corresponds to one client session: it keeps the snapshot
/// most recently delivered by its subscription, answers lookups from it and
/// mediates every mutation. Clones share the same snapshot.
#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    snapshot: Arc<RwLock<Vec<Task>>>,
    ownership: OwnershipCheck,
}

impl TaskStore {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            metrics: Arc::new(Metrics::new()),
            snapshot: Arc::new(RwLock::new(Vec::new())),
            ownership: OwnershipCheck::default(),
        }
    }

    pub fn with_ownership_check(mut self, ownership: OwnershipCheck) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// New session over the same store and sinks, with an empty snapshot
    pub fn session(&self) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Vec::new())),
            ..self.clone()
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Live view of the owner's tasks, newest first.
    ///
    /// Without an owner the subscription yields one empty snapshot and ends.
    pub fn subscribe(&self, owner: Option<&str>) -> TaskSubscription {
        let inner = match owner {
            Some(owner) => {
                info!(%owner, "Subscribing to tasks");
                let query = Query::new(Collection::Tasks)
                    .filter_eq("userId", owner)
                    .order_by("createdAt", Direction::Desc);
                Subscription::new(self.store.clone(), query)
            }
            None => {
                self.replace_snapshot(Vec::new());
                Subscription::empty()
            }
        };
        TaskSubscription::new(inner, self.clone())
    }

    /// Create a task for `owner`; returns the store-assigned id
    pub async fn add_task(&self, owner: Option<&str>, task: NewTask) -> Result<String> {
        let owner = owner.ok_or(TaskError::Unauthenticated)?;
        let website = task.website.clone();

        let id = self
            .store
            .create(Collection::Tasks, task.into_fields(owner))
            .await
            .inspect_err(|err| self.report("Could not create task", err))?;

        info!(task_id = %id, %owner, %website, "Task created");
        self.metrics.task_created();
        self.notifier.notify(Notification::task_queued(&website));
        Ok(id)
    }

    pub async fn update_task(&self, owner: Option<&str>, task_id: &str, patch: TaskPatch) -> Result<()> {
        let owner = owner.ok_or(TaskError::Unauthenticated)?;
        self.check_ownership(owner, task_id).await?;

        self.store
            .update(Collection::Tasks, task_id, patch.into_fields())
            .await
            .inspect_err(|err| self.report("Could not update task", err))?;

        info!(%task_id, %owner, "Task updated");
        self.metrics.task_updated();
        self.notifier.notify(Notification::task_updated());
        Ok(())
    }

    pub async fn delete_task(&self, owner: Option<&str>, task_id: &str) -> Result<()> {
        let owner = owner.ok_or(TaskError::Unauthenticated)?;
        self.check_ownership(owner, task_id).await?;

        self.store
            .delete(Collection::Tasks, task_id)
            .await
            .inspect_err(|err| self.report("Could not delete task", err))?;

        info!(%task_id, %owner, "Task deleted");
        self.metrics.task_deleted();
        self.notifier.notify(Notification::task_deleted());
        Ok(())
    }

    /// Re-read the owner's tasks into the local snapshot without running the
    /// completion latch
    pub async fn refresh(&self, owner: &str) -> Result<Vec<Task>> {
        let query = Query::new(Collection::Tasks)
            .filter_eq("userId", owner)
            .order_by("createdAt", Direction::Desc);
        let tasks: Vec<Task> = self
            .store
            .query(&query)
            .await?
            .iter()
            .filter_map(|doc| doc.decode().ok())
            .collect();
        self.replace_snapshot(tasks.clone());
        Ok(tasks)
    }

    /// Lookup in the current local snapshot
    pub fn get_task_by_id(&self, task_id: &str) -> Option<Task> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
    }

    /// Current local snapshot, newest first
    pub fn tasks(&self) -> Vec<Task> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace_snapshot(&self, tasks: Vec<Task>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = tasks;
    }

    /// Flip the notified latch for every completed, un-notified task in
    /// `snapshot`. Returns the tasks whose latch this call flipped; a task
    /// another subscriber already claimed is left out.
    pub(crate) async fn claim_completions(&self, snapshot: &mut [Task]) -> Vec<Task> {
        let mut claimed = Vec::new();

        for task in snapshot.iter_mut().filter(|t| t.awaiting_notification()) {
            let mut fields = Fields::new();
            fields.insert("notified".into(), FieldValue::of(true));

            match self
                .store
                .update_if(
                    Collection::Tasks,
                    &task.id,
                    Precondition::NotEquals("notified".into(), json!(true)),
                    fields,
                )
                .await
            {
                Ok(true) => {
                    task.notified = true;
                    self.metrics.task_completed();
                    claimed.push(task.clone());
                }
                Ok(false) => {
                    debug!(task_id = %task.id, "Completion already claimed");
                    task.notified = true;
                }
                Err(err) => {
                    // Retried on the next delivery
                    warn!(task_id = %task.id, %err, "Failed to mark task notified");
                }
            }
        }

        claimed
    }

    async fn check_ownership(&self, owner: &str, task_id: &str) -> Result<()> {
        let task_owner = match self.ownership {
            OwnershipCheck::LocalSnapshot => self.get_task_by_id(task_id).map(|t| t.user_id),
            OwnershipCheck::Authoritative => self
                .store
                .get(Collection::Tasks, task_id)
                .await?
                .and_then(|doc| doc.get("userId").and_then(Value::as_str).map(String::from)),
        };

        match task_owner {
            Some(task_owner) if task_owner == owner => Ok(()),
            _ => {
                warn!(%task_id, %owner, mode = ?self.ownership, "Task ownership check failed");
                self.notifier.notify(Notification::error(
                    "Permission denied",
                    "You do not have permission to modify this task.",
                ));
                Err(TaskError::PermissionDenied(task_id.to_string()))
            }
        }
    }

    fn report(&self, title: &str, err: &StoreError) {
        warn!(%err, "{title}");
        self.notifier.notify(Notification::error(title, err.to_string()));
    }
}
