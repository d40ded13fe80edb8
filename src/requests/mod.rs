//! Custom scraping requests
//!
//! Requests for sites outside the catalog go to a human for review. The
//! client validates the form, uploads attachments, stores the request as
//! `submitted` and lets the owner follow their latest requests live.

mod client;
mod model;
mod validation;

pub use client::RequestClient;
pub use model::{Attachment, CustomRequest, CustomRequestStatus, RequestForm};
pub use validation::{FormError, is_email, is_web_url, validate};

use thiserror::Error;

use crate::docstore::StoreError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("not signed in")]
    Unauthenticated,

    #[error(transparent)]
    Validation(#[from] FormError),

    #[error("attachment upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RequestError>;
