//! The submission pipeline: Received → Validated → Persisted → Notified.
//!
//! Validation failures stop the pipeline before anything is written. Once a
//! submission is persisted, everything downstream (file storage, notifications,
//! webhooks) is best-effort: failures are logged and never roll the
//! submission back or block sibling side effects.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::adapters::file_storage::FileStorage;
use crate::adapters::notifier::{render_notification, NotificationDispatcher};
use crate::adapters::webhook::WebhookTrigger;
use crate::compiler::{CompileOptions, FormSchema, ValidationErrors};
use crate::persistence::{
    NewSubmission, NewUploadedFile, PersistenceError, StoredForm, Submission,
    SubmissionRepository,
};

/// One uploaded file accompanying a submission, keyed by compiled field key.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// Raw submitted data as received from the request context.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub data: Map<String, Value>,
    pub files: HashMap<String, FilePayload>,
    pub page_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub compile: CompileOptions,
    pub notifications_enabled: bool,
    pub notification_subject: Option<String>,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Submitted data failed field validation; nothing was persisted.
    #[error("{0}")]
    Invalid(ValidationErrors),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub struct SubmissionPipeline {
    submissions: Arc<dyn SubmissionRepository>,
    file_storage: Option<Arc<dyn FileStorage>>,
    notifier: Arc<dyn NotificationDispatcher>,
    webhooks: WebhookTrigger,
    options: PipelineOptions,
}

impl SubmissionPipeline {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        file_storage: Option<Arc<dyn FileStorage>>,
        notifier: Arc<dyn NotificationDispatcher>,
        webhooks: WebhookTrigger,
        options: PipelineOptions,
    ) -> Self {
        Self {
            submissions,
            file_storage,
            notifier,
            webhooks,
            options,
        }
    }

    /// Run one submission through the whole pipeline.
    pub async fn process(
        &self,
        form: &StoredForm,
        input: SubmissionInput,
    ) -> Result<Submission, SubmissionError> {
        let schema = FormSchema::compile(&form.definition, &self.options.compile);

        // Uploaded files stand in as their filename so required file fields
        // validate alongside everything else.
        let mut data = input.data;
        for (key, payload) in &input.files {
            data.insert(key.clone(), Value::String(payload.filename.clone()));
        }

        let mut cleaned = schema.validate(&data).map_err(SubmissionError::Invalid)?;

        // Files are persisted separately, never embedded in form_data.
        for field in schema.fields() {
            if field.kind.is_file() {
                cleaned.remove(&field.key);
            }
        }

        let submission = self
            .submissions
            .create(NewSubmission {
                form_id: form.id.clone(),
                page_id: input.page_id,
                form_data: cleaned,
            })
            .await?;

        tracing::info!(
            submission = %submission.id,
            form = %form.id,
            "submission persisted"
        );

        self.store_files(&submission, &schema, input.files).await;
        self.notify(form, &submission).await;
        self.run_webhooks(form, &submission).await;

        Ok(submission)
    }

    async fn store_files(
        &self,
        submission: &Submission,
        schema: &FormSchema,
        files: HashMap<String, FilePayload>,
    ) {
        if files.is_empty() {
            return;
        }
        let Some(storage) = &self.file_storage else {
            tracing::warn!(
                submission = %submission.id,
                count = files.len(),
                "no file storage configured, skipping uploaded files"
            );
            return;
        };
        for (key, payload) in files {
            let is_file_field = schema.get(&key).map(|f| f.kind.is_file()).unwrap_or(false);
            if !is_file_field {
                tracing::warn!(field = %key, "upload for a non-file field, ignoring");
                continue;
            }
            match storage.put(&payload.filename, payload.content).await {
                Ok(file_path) => {
                    let record = NewUploadedFile {
                        submission_id: submission.id.clone(),
                        field_key: key,
                        file_path,
                        content_type: payload.content_type,
                    };
                    if let Err(e) = self.submissions.attach_file(record).await {
                        tracing::error!(error = %e, "failed to record uploaded file");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, field = %key, "failed to store uploaded file");
                }
            }
        }
    }

    async fn notify(&self, form: &StoredForm, submission: &Submission) {
        if !self.options.notifications_enabled || form.recipients.is_empty() {
            return;
        }
        let message = match render_notification(
            form.title(),
            &submission.form_data,
            submission.page_id.as_deref(),
            submission.submit_time,
            self.options.notification_subject.as_deref(),
        ) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "failed to render notification");
                return;
            }
        };
        for recipient in &form.recipients {
            if let Err(e) = self.notifier.dispatch(recipient, &message).await {
                tracing::error!(error = %e, recipient, "notification dispatch failed");
            }
        }
    }

    async fn run_webhooks(&self, form: &StoredForm, submission: &Submission) {
        for webhook in &form.webhooks {
            match self.webhooks.trigger(webhook, &submission.form_data).await {
                Ok(response) => {
                    tracing::info!(url = %webhook.url, status = response.status, "webhook delivered");
                }
                Err(e) => {
                    tracing::error!(url = %webhook.url, error = %e, "webhook dispatch failed");
                }
            }
        }
    }
}
