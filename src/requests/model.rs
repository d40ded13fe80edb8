use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of a custom request; advanced by support staff, never by
/// the submitting client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomRequestStatus {
    Submitted,
    InReview,
    Accepted,
    Rejected,
    Completed,
}

impl CustomRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomRequestStatus::Submitted => "submitted",
            CustomRequestStatus::InReview => "in_review",
            CustomRequestStatus::Accepted => "accepted",
            CustomRequestStatus::Rejected => "rejected",
            CustomRequestStatus::Completed => "completed",
        }
    }
}

/// A bespoke scraping request as stored in `customRequests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRequest {
    pub id: String,
    pub user_id: String,
    pub website_url: String,
    pub description: String,
    pub email: String,
    /// Storage keys of uploaded files
    #[serde(default)]
    pub attachments: Vec<String>,
    pub status: CustomRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// The custom request form as filled in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestForm {
    pub website_url: String,
    pub description: String,
    pub email: String,
    pub attachments: Vec<Attachment>,
}
