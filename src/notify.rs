//! User-facing notifications
//!
//! Every store mutation and every swallowed failure ends up here as a short
//! [`Notification`]. Sinks decide where it goes: the log, a channel feeding a
//! UI or an SSE stream, or several of them at once.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::tasks::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(level: Level, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Error, title, description)
    }

    pub fn task_queued(website: &str) -> Self {
        Self::new(
            Level::Info,
            "Task queued",
            format!("Collecting data from {website} has been queued."),
        )
    }

    pub fn task_updated() -> Self {
        Self::new(Level::Info, "Task updated", "The task has been updated.")
    }

    pub fn task_deleted() -> Self {
        Self::new(Level::Info, "Task deleted", "The task has been deleted.")
    }

    /// One notification for every task completed in a single delivery.
    /// Returns `None` when nothing completed.
    pub fn tasks_completed(tasks: &[Task]) -> Option<Self> {
        let description = match tasks {
            [] => return None,
            [task] => format!("Data from {} is ready to download.", task.website),
            many => format!("{} tasks have completed and are ready to download.", many.len()),
        };
        Some(Self::new(Level::Success, "Task completed", description))
    }

    pub fn export_finished(format: &str) -> Self {
        Self::new(
            Level::Success,
            "Download ready",
            format!("Data has been exported as {}.", format.to_uppercase()),
        )
    }
}

/// Destination for user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Renders notifications as log lines
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Error => error!(title = %n.title, "{}", n.description),
            Level::Info | Level::Success => info!(title = %n.title, "{}", n.description),
        }
    }
}

/// Forwards notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is looking anymore
        let _ = self.tx.send(notification);
    }
}

/// Sends every notification to each inner sink
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}
