use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Document {0} is not a JSON object")]
    NotAnObject(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
