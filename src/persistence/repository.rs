//! Repository traits and SQL implementations for forms and submissions.
//!
//! Consumers take these traits by `Arc<dyn ...>` so the compiler and pipeline
//! are handed concrete record bindings at construction instead of resolving
//! them at call time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::persistence::error::PersistenceError;
use crate::persistence::models::{
    FormRow, NewForm, NewSubmission, NewUploadedFile, StoredForm, Submission, SubmissionRow,
    SubmissionStatus, UploadedFileRow,
};
use crate::persistence::pool::ConnectionPool;

/// CRUD over stored form definitions.
#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn create(&self, form: NewForm) -> Result<StoredForm, PersistenceError>;
    async fn get(&self, id: &str) -> Result<Option<StoredForm>, PersistenceError>;
    async fn list(&self) -> Result<Vec<StoredForm>, PersistenceError>;
    /// Replace the definition, webhooks and recipients of an existing form.
    /// Fails with [`PersistenceError::NotFound`] when no such form exists.
    async fn update(&self, form: &StoredForm) -> Result<(), PersistenceError>;
    async fn delete(&self, id: &str) -> Result<bool, PersistenceError>;
}

/// Time-range filter for the submissions report.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub form_id: Option<String>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
}

/// Storage for submissions and the uploads attached to them.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create(&self, submission: NewSubmission) -> Result<Submission, PersistenceError>;
    async fn get(&self, id: &str) -> Result<Option<Submission>, PersistenceError>;
    /// Matching submissions, newest first.
    async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, PersistenceError>;
    /// Update the one mutable submission attribute.
    async fn set_status(
        &self,
        id: &str,
        status: SubmissionStatus,
    ) -> Result<bool, PersistenceError>;
    async fn attach_file(
        &self,
        file: NewUploadedFile,
    ) -> Result<UploadedFileRow, PersistenceError>;
    async fn files_for(
        &self,
        submission_id: &str,
    ) -> Result<Vec<UploadedFileRow>, PersistenceError>;
}

pub struct SqlFormRepository {
    pool: ConnectionPool,
}

impl SqlFormRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn row_from(row: &sqlx::any::AnyRow) -> Result<FormRow, PersistenceError> {
        Ok(FormRow {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            definition: row.try_get("definition")?,
            webhooks: row.try_get("webhooks")?,
            recipients: row.try_get("recipients")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl FormRepository for SqlFormRepository {
    async fn create(&self, form: NewForm) -> Result<StoredForm, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let definition = serde_json::to_string(&form.definition.form_fields)?;
        let webhooks = serde_json::to_string(&form.webhooks)?;
        let recipients = serde_json::to_string(&form.recipients)?;

        sqlx::query(
            "INSERT INTO forms (id, title, definition, webhooks, recipients, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&form.definition.title)
        .bind(&definition)
        .bind(&webhooks)
        .bind(&recipients)
        .bind(&now)
        .bind(&now)
        .execute(self.pool.pool())
        .await?;

        Ok(StoredForm {
            id,
            definition: form.definition,
            webhooks: form.webhooks,
            recipients: form.recipients,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredForm>, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, title, definition, webhooks, recipients, created_at, updated_at FROM forms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_from(&row)?.try_into()?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<StoredForm>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, title, definition, webhooks, recipients, created_at, updated_at FROM forms ORDER BY created_at",
        )
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter()
            .map(|row| Self::row_from(row)?.try_into())
            .collect()
    }

    async fn update(&self, form: &StoredForm) -> Result<(), PersistenceError> {
        let definition = serde_json::to_string(&form.definition.form_fields)?;
        let webhooks = serde_json::to_string(&form.webhooks)?;
        let recipients = serde_json::to_string(&form.recipients)?;

        let result = sqlx::query(
            "UPDATE forms SET title = ?, definition = ?, webhooks = ?, recipients = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&form.definition.title)
        .bind(&definition)
        .bind(&webhooks)
        .bind(&recipients)
        .bind(Utc::now().to_rfc3339())
        .bind(&form.id)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound {
                entity_type: "form".to_string(),
                id: form.id.clone(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct SqlSubmissionRepository {
    pool: ConnectionPool,
}

impl SqlSubmissionRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn row_from(row: &sqlx::any::AnyRow) -> Result<SubmissionRow, PersistenceError> {
        Ok(SubmissionRow {
            id: row.try_get("id")?,
            form_id: row.try_get("form_id")?,
            page_id: row.try_get("page_id")?,
            submit_time: row.try_get("submit_time")?,
            status: row.try_get("status")?,
            form_data: row.try_get("form_data")?,
        })
    }
}

#[async_trait]
impl SubmissionRepository for SqlSubmissionRepository {
    async fn create(&self, submission: NewSubmission) -> Result<Submission, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let submit_time = Utc::now();
        let form_data = serde_json::to_string(&submission.form_data)?;

        sqlx::query(
            "INSERT INTO submissions (id, form_id, page_id, submit_time, status, form_data) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&submission.form_id)
        .bind(&submission.page_id)
        .bind(submit_time.to_rfc3339())
        .bind(SubmissionStatus::New.as_str())
        .bind(&form_data)
        .execute(self.pool.pool())
        .await?;

        Ok(Submission {
            id,
            form_id: submission.form_id,
            page_id: submission.page_id,
            submit_time,
            status: SubmissionStatus::New,
            form_data: submission.form_data,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Submission>, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, form_id, page_id, submit_time, status, form_data FROM submissions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_from(&row)?.try_into()?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, PersistenceError> {
        let mut sql = String::from(
            "SELECT id, form_id, page_id, submit_time, status, form_data FROM submissions WHERE 1 = 1",
        );
        if filter.form_id.is_some() {
            sql.push_str(" AND form_id = ?");
        }
        if filter.submitted_from.is_some() {
            sql.push_str(" AND submit_time >= ?");
        }
        if filter.submitted_to.is_some() {
            sql.push_str(" AND submit_time <= ?");
        }
        sql.push_str(" ORDER BY submit_time DESC");

        let mut query = sqlx::query(&sql);
        if let Some(form_id) = &filter.form_id {
            query = query.bind(form_id);
        }
        if let Some(from) = &filter.submitted_from {
            query = query.bind(from.to_rfc3339());
        }
        if let Some(to) = &filter.submitted_to {
            query = query.bind(to.to_rfc3339());
        }

        let rows = query.fetch_all(self.pool.pool()).await?;
        rows.iter()
            .map(|row| Self::row_from(row)?.try_into())
            .collect()
    }

    async fn set_status(
        &self,
        id: &str,
        status: SubmissionStatus,
    ) -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE submissions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_file(
        &self,
        file: NewUploadedFile,
    ) -> Result<UploadedFileRow, PersistenceError> {
        let row = UploadedFileRow {
            id: Uuid::new_v4().to_string(),
            submission_id: file.submission_id,
            field_key: file.field_key,
            file_path: file.file_path,
            content_type: file.content_type,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO uploaded_files (id, submission_id, field_key, file_path, content_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.submission_id)
        .bind(&row.field_key)
        .bind(&row.file_path)
        .bind(&row.content_type)
        .bind(&row.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(row)
    }

    async fn files_for(
        &self,
        submission_id: &str,
    ) -> Result<Vec<UploadedFileRow>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, submission_id, field_key, file_path, content_type, created_at FROM uploaded_files WHERE submission_id = ? ORDER BY created_at",
        )
        .bind(submission_id)
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UploadedFileRow {
                    id: row.try_get("id")?,
                    submission_id: row.try_get("submission_id")?,
                    field_key: row.try_get("field_key")?,
                    file_path: row.try_get("file_path")?,
                    content_type: row.try_get("content_type")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
