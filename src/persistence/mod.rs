//! Database persistence layer
//!
//! Stores form definitions, submissions and uploaded-file records, supporting
//! PostgreSQL, SQLite, and MySQL through `sqlx::Any`.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::PersistenceError;
pub use migrations::MigrationRunner;
pub use models::{
    FormRow, NewForm, NewSubmission, NewUploadedFile, StoredForm, Submission, SubmissionRow,
    SubmissionStatus, UploadedFileRow,
};
pub use pool::{ConnectionPool, DatabaseBackend};
pub use repository::{
    FormRepository, SqlFormRepository, SqlSubmissionRepository, SubmissionFilter,
    SubmissionRepository,
};
