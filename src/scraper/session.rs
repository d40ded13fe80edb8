use std::time::Duration;

use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::catalog::{self, Website};
use super::results::placeholder_results;
use super::{FormError, Result, ScraperError};
use crate::config::ScraperConfig;
use crate::notify::Notification;
use crate::tasks::{NewTask, ResultRow, Task, TaskPatch, TaskStatus, TaskStore, TaskSubscription};

/// Upper bound for waiting on our own writes to come back through the
/// subscription
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Configuring,
    Submitting,
    InProgress {
        task_id: String,
        progress: u8,
    },
    Completed {
        task_id: String,
        results: Vec<ResultRow>,
    },
    Failed {
        task_id: Option<String>,
        reason: String,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Configuring => "configuring",
            Phase::Submitting => "submitting",
            Phase::InProgress { .. } => "in progress",
            Phase::Completed { .. } => "completed",
            Phase::Failed { .. } => "failed",
        }
    }
}

/// What the user filled in. `website` is a catalog id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeForm {
    pub website: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub search_location: String,
    pub results_limit: Option<u32>,
}

/// One user's scraper screen
pub struct ScraperSession {
    tasks: TaskStore,
    subscription: TaskSubscription,
    owner: Option<String>,
    settings: ScraperConfig,
    form: ScrapeForm,
    phase: Phase,
}

impl ScraperSession {
    pub fn new(tasks: &TaskStore, owner: Option<String>, settings: ScraperConfig) -> Self {
        let tasks = tasks.session();
        let subscription = tasks.subscribe(owner.as_deref());
        Self {
            tasks,
            subscription,
            owner,
            settings,
            form: ScrapeForm::default(),
            phase: Phase::Configuring,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn form(&self) -> &ScrapeForm {
        &self.form
    }

    pub fn progress(&self) -> Option<u8> {
        match self.phase {
            Phase::InProgress { progress, .. } => Some(progress),
            Phase::Completed { .. } => Some(100),
            _ => None,
        }
    }

    pub fn website(&self) -> Option<&'static Website> {
        self.form.website.as_deref().and_then(catalog::find)
    }

    /// Apply a whole form, in the order a user would fill it in
    pub fn fill(&mut self, form: ScrapeForm) -> Result<()> {
        if let Some(id) = &form.website {
            self.select_website(id)?;
        }
        for field in &form.fields {
            if !self.form.fields.contains(field) {
                self.toggle_field(field)?;
            }
        }
        self.set_search_term(form.search_term)?;
        self.set_search_location(form.search_location)?;
        if let Some(limit) = form.results_limit {
            self.set_results_limit(&limit.to_string())?;
        }
        Ok(())
    }

    /// Choosing a website clears fields and parameters
    pub fn select_website(&mut self, id: &str) -> Result<()> {
        self.expect_configuring("select a website")?;
        let site = catalog::find(id).ok_or_else(|| FormError::UnknownWebsite(id.to_string()))?;
        self.form = ScrapeForm {
            website: Some(site.id.to_string()),
            ..ScrapeForm::default()
        };
        Ok(())
    }

    pub fn toggle_field(&mut self, field: &str) -> Result<()> {
        self.expect_configuring("change fields")?;
        let site = self.website().ok_or(FormError::NoWebsite)?;
        if !site.offers(field) {
            return Err(FormError::UnsupportedField {
                website: site.name,
                field: field.to_string(),
            }
            .into());
        }

        match self.form.fields.iter().position(|f| f == field) {
            Some(pos) => {
                self.form.fields.remove(pos);
            }
            None => self.form.fields.push(field.to_string()),
        }
        Ok(())
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) -> Result<()> {
        self.expect_configuring("edit the search term")?;
        self.form.search_term = term.into();
        Ok(())
    }

    pub fn set_search_location(&mut self, location: impl Into<String>) -> Result<()> {
        self.expect_configuring("edit the location")?;
        self.form.search_location = location.into();
        Ok(())
    }

    pub fn set_results_limit(&mut self, raw: &str) -> Result<()> {
        self.expect_configuring("edit the results limit")?;
        let limit = match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => return Err(FormError::InvalidResultsLimit(raw.to_string()).into()),
        };
        self.form.results_limit = Some(limit);
        Ok(())
    }

    /// Task fields for the current form, or the first problem with it
    pub fn validate(&self) -> std::result::Result<NewTask, FormError> {
        let site = self.website().ok_or(FormError::NoWebsite)?;
        if self.form.fields.is_empty() {
            return Err(FormError::NoFields);
        }
        let term = self.form.search_term.trim();
        if term.is_empty() && site.requires_search_term {
            return Err(FormError::MissingSearchTerm);
        }

        let location = self.form.search_location.trim();
        Ok(NewTask::builder()
            .website(site.name)
            .fields(self.form.fields.clone())
            .maybe_search_term((!term.is_empty()).then(|| term.to_string()))
            .maybe_search_location((!location.is_empty()).then(|| location.to_string()))
            .results_limit(
                self.form
                    .results_limit
                    .unwrap_or(self.settings.default_results_limit),
            )
            .build())
    }

    /// Validate and create the task. On success the session is in progress
    /// at 0%.
    pub async fn start(&mut self) -> Result<String> {
        self.expect_configuring("start")?;

        let new_task = match self.validate() {
            Ok(task) => task,
            Err(err) => {
                self.tasks
                    .notifier()
                    .notify(Notification::error("Check the form", err.to_string()));
                return Err(err.into());
            }
        };

        self.phase = Phase::Submitting;
        match self.tasks.add_task(self.owner.as_deref(), new_task).await {
            Ok(task_id) => {
                info!(%task_id, website = ?self.form.website, "Scrape started");
                self.phase = Phase::InProgress {
                    task_id: task_id.clone(),
                    progress: 0,
                };
                Ok(task_id)
            }
            Err(err) => {
                warn!(%err, "Scrape could not start");
                self.phase = Phase::Failed {
                    task_id: None,
                    reason: err.to_string(),
                };
                Err(err.into())
            }
        }
    }

    /// One progress tick. Reaching 100% completes the task.
    pub async fn advance(&mut self) -> Result<&Phase> {
        let (task_id, progress) = match &self.phase {
            Phase::InProgress { task_id, progress } => (task_id.clone(), *progress),
            other => {
                return Err(ScraperError::InvalidState {
                    action: "advance progress",
                    phase: other.name(),
                });
            }
        };

        let progress = progress.saturating_add(self.settings.progress_step).min(100);
        debug!(%task_id, progress, "Scrape progress");

        if progress < 100 {
            self.phase = Phase::InProgress { task_id, progress };
        } else {
            self.complete(task_id).await?;
        }
        Ok(&self.phase)
    }

    /// Drive the progress loop until the run completes or fails
    pub async fn run(&mut self) -> Result<&Phase> {
        let mut ticker = tokio::time::interval(self.settings.progress_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        while matches!(self.phase, Phase::InProgress { .. }) {
            ticker.tick().await;
            self.advance().await?;
        }
        Ok(&self.phase)
    }

    /// "Start new": back to an empty form
    pub fn reset(&mut self) -> Result<()> {
        match self.phase {
            Phase::Completed { .. } | Phase::Failed { .. } => {
                self.form = ScrapeForm::default();
                self.phase = Phase::Configuring;
                Ok(())
            }
            ref other => Err(ScraperError::InvalidState {
                action: "start a new run",
                phase: other.name(),
            }),
        }
    }

    async fn complete(&mut self, task_id: String) -> Result<()> {
        let (Some(site), Some(_)) = (self.website(), self.owner.as_deref()) else {
            self.phase = Phase::Failed {
                task_id: Some(task_id),
                reason: "session lost its website or user".to_string(),
            };
            return Ok(());
        };

        let count = match self.form.results_limit {
            Some(limit) => self.settings.placeholder_results.min(limit as usize),
            None => self.settings.placeholder_results,
        };
        let rows = placeholder_results(site, &self.form.fields, count);
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            items: Some(rows.len() as u64),
            result: Some(serde_json::to_string(&rows)?),
            ..TaskPatch::default()
        };

        // Ownership is checked against our snapshot, so wait until the new
        // task has been delivered to it
        self.await_task(&task_id, |_| true).await;

        match self
            .tasks
            .update_task(self.owner.as_deref(), &task_id, patch)
            .await
        {
            Ok(()) => {
                self.await_task(&task_id, |t| t.status == TaskStatus::Completed)
                    .await;
                info!(%task_id, items = rows.len(), "Scrape completed");
                self.phase = Phase::Completed {
                    task_id,
                    results: rows,
                };
            }
            Err(err) => {
                warn!(%task_id, %err, "Scrape could not complete");
                self.phase = Phase::Failed {
                    task_id: Some(task_id),
                    reason: err.to_string(),
                };
            }
        }
        Ok(())
    }

    /// Pull snapshots until `task_id` is present and `ready`. Gives up after
    /// [`SYNC_TIMEOUT`] or when the subscription ends.
    async fn await_task(&mut self, task_id: &str, ready: impl Fn(&Task) -> bool) -> bool {
        let tasks = &self.tasks;
        let subscription = &mut self.subscription;

        let wait = async {
            loop {
                if tasks.get_task_by_id(task_id).is_some_and(|t| ready(&t)) {
                    return true;
                }
                match subscription.next().await {
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%task_id, %err, "Task subscription failed");
                        return false;
                    }
                    None => return false,
                }
            }
        };

        tokio::time::timeout(SYNC_TIMEOUT, wait)
            .await
            .unwrap_or(false)
    }

    fn expect_configuring(&self, action: &'static str) -> Result<()> {
        match self.phase {
            Phase::Configuring => Ok(()),
            ref other => Err(ScraperError::InvalidState {
                action,
                phase: other.name(),
            }),
        }
    }
}
