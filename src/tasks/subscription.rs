use futures::Stream;
use tracing::debug;

use super::model::Task;
use super::store::{Result, TaskStore};
use crate::docstore::Subscription;
use crate::notify::Notification;

/// Live view of one owner's tasks.
///
/// Each delivered snapshot replaces the session's local snapshot. Tasks that
/// completed since the last delivery are latched (`notified = true`) and
/// announced with a single batched notification.
pub struct TaskSubscription {
    inner: Subscription<Task>,
    tasks: TaskStore,
}

impl TaskSubscription {
    pub(crate) fn new(inner: Subscription<Task>, tasks: TaskStore) -> Self {
        Self { inner, tasks }
    }

    /// Next snapshot, newest first. `None` once the sequence has ended.
    pub async fn next(&mut self) -> Option<Result<Vec<Task>>> {
        let mut snapshot = match self.inner.next().await? {
            Ok(snapshot) => snapshot,
            Err(err) => return Some(Err(err.into())),
        };

        let claimed = self.tasks.claim_completions(&mut snapshot).await;
        self.tasks.replace_snapshot(snapshot.clone());
        debug!(tasks = snapshot.len(), completed = claimed.len(), "Task snapshot delivered");

        if let Some(notification) = Notification::tasks_completed(&claimed) {
            self.tasks.notifier().notify(notification);
        }

        Some(Ok(snapshot))
    }

    pub fn cancel(self) {
        self.inner.cancel();
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Task>>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
    }
}
