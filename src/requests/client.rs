use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::model::{CustomRequest, CustomRequestStatus, RequestForm};
use super::validation::validate;
use super::{RequestError, Result};
use crate::config::RequestsConfig;
use crate::docstore::{
    Collection, Direction, DocumentStore, FieldValue, Fields, Query, Subscription,
};
use crate::notify::{Level, Notification, Notifier};
use crate::observability::Metrics;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct RequestClient {
    store: Arc<dyn DocumentStore>,
    storage: StorageClient,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    limits: RequestsConfig,
}

impl RequestClient {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: StorageClient,
        notifier: Arc<dyn Notifier>,
        limits: RequestsConfig,
    ) -> Self {
        Self {
            store,
            storage,
            notifier,
            metrics: Arc::new(Metrics::new()),
            limits,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Validate, upload attachments and store the request. Returns its id.
    pub async fn submit(&self, owner: Option<&str>, form: RequestForm) -> Result<String> {
        let owner = owner.ok_or(RequestError::Unauthenticated)?;
        validate(&form, &self.limits)?;

        match self.write(owner, form).await {
            Ok(id) => {
                info!(request_id = %id, %owner, "Custom request submitted");
                self.metrics.request_submitted();
                self.notifier.notify(Notification::new(
                    Level::Success,
                    "Request submitted",
                    format!("Your request has been received with ID {id}."),
                ));
                Ok(id)
            }
            Err(err) => {
                warn!(%owner, %err, "Custom request failed");
                self.notifier.notify(Notification::error(
                    "Request failed",
                    "Could not submit the custom request. Please try again.",
                ));
                Err(err)
            }
        }
    }

    /// The owner's newest requests, live
    pub fn subscribe_recent(&self, owner: Option<&str>) -> Subscription<CustomRequest> {
        match owner {
            Some(owner) => {
                let query = Query::new(Collection::CustomRequests)
                    .filter_eq("userId", owner)
                    .order_by("createdAt", Direction::Desc)
                    .limit(self.limits.recent_limit);
                Subscription::new(self.store.clone(), query)
            }
            None => Subscription::empty(),
        }
    }

    async fn write(&self, owner: &str, form: RequestForm) -> Result<String> {
        let batch = Uuid::now_v7().simple().to_string();
        let mut keys = Vec::with_capacity(form.attachments.len());
        for attachment in form.attachments {
            let key = format!("attachments/{owner}/{batch}/{}", attachment.name);
            self.storage.put(&key, attachment.content).await?;
            keys.push(key);
        }

        let mut fields = Fields::new();
        fields.insert("userId".into(), FieldValue::of(owner));
        fields.insert("websiteUrl".into(), FieldValue::of(form.website_url.trim()));
        fields.insert("description".into(), FieldValue::of(form.description));
        fields.insert("email".into(), FieldValue::of(form.email.trim()));
        fields.insert("attachments".into(), FieldValue::of(keys));
        fields.insert(
            "status".into(),
            FieldValue::of(CustomRequestStatus::Submitted.as_str()),
        );
        fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
        fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        Ok(self.store.create(Collection::CustomRequests, fields).await?)
    }
}
