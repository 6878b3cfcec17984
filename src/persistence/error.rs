//! Persistence layer error types

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored column holds content that no longer decodes
    #[error("Corrupt stored content for {entity_type} '{id}': {reason}")]
    CorruptContent {
        entity_type: String,
        id: String,
        reason: String,
    },

    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
