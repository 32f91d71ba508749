use crate::messages::Reason;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The named record does not exist
    #[error("{0}")]
    NotFound(Reason),

    /// The request payload failed validation
    #[error("{0}")]
    InvalidParameter(Reason),

    /// The request is well formed but conflicts with current state
    #[error("{0}")]
    InvalidOperation(Reason),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CatalogError {
    /// The stable error code for client-facing errors
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CatalogError::NotFound(reason)
            | CatalogError::InvalidParameter(reason)
            | CatalogError::InvalidOperation(reason) => Some(reason.code),
            _ => None,
        }
    }
}
