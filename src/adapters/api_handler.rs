//! REST surface: form CRUD, submission intake, and the submissions report.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::compiler::{CompileOptions, FormLayout, FormSchema};
use crate::domain::{FormDefinition, FormNode, WebhookConfig};
use crate::persistence::{
    ConnectionPool, FormRepository, NewForm, PersistenceError, StoredForm, Submission,
    SubmissionFilter, SubmissionRepository, SubmissionStatus,
};
use crate::pipeline::{FilePayload, SubmissionError, SubmissionInput, SubmissionPipeline};

#[derive(Clone)]
pub struct ApiState {
    pub forms: Arc<dyn FormRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub pipeline: Arc<SubmissionPipeline>,
    pub pool: ConnectionPool,
    pub compile: CompileOptions,
}

/// API-level errors with their HTTP mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid form definition")]
    InvalidDefinition(Vec<String>),
    #[error("form '{0}' not found")]
    FormNotFound(String),
    #[error("submission '{0}' not found")]
    SubmissionNotFound(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({"error": message}))
            }
            Self::InvalidDefinition(problems) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "invalid form definition", "problems": problems}),
            ),
            Self::FormNotFound(_) | Self::SubmissionNotFound(_) => {
                (StatusCode::NOT_FOUND, json!({"error": self.to_string()}))
            }
            Self::Persistence(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %e, "persistence error");
                    (status, json!({"error": "internal error"}))
                } else {
                    (status, json!({"error": e.to_string()}))
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub title: String,
    #[serde(default)]
    pub form_fields: Vec<FormNode>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&StoredForm> for FormSummary {
    fn from(form: &StoredForm) -> Self {
        Self {
            id: form.id.clone(),
            title: form.title().to_string(),
            created_at: form.created_at.clone(),
            updated_at: form.updated_at.clone(),
        }
    }
}

/// Reject a definition an editor should not be able to save: structural
/// problems, duplicate compiled keys, or webhook templates that do not parse.
fn check_authoring(
    definition: &FormDefinition,
    webhooks: &[WebhookConfig],
) -> Result<(), ApiError> {
    let mut problems = Vec::new();
    if let Err(errors) = definition.validate() {
        problems.extend(errors.iter().map(ToString::to_string));
    }
    if let Err(e) = FormSchema::verify_unique_keys(definition) {
        problems.push(e.to_string());
    }
    for webhook in webhooks {
        if let Err(e) = webhook.validate() {
            problems.push(e.to_string());
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ApiError::InvalidDefinition(problems))
    }
}

pub async fn create_form(
    State(state): State<ApiState>,
    Json(request): Json<CreateFormRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let definition = FormDefinition::new(request.title, request.form_fields);
    check_authoring(&definition, &request.webhooks)?;
    let form = state
        .forms
        .create(NewForm {
            definition,
            webhooks: request.webhooks,
            recipients: request.recipients,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(FormSummary::from(&form))))
}

pub async fn list_forms(
    State(state): State<ApiState>,
) -> Result<Json<Vec<FormSummary>>, ApiError> {
    let forms = state.forms.list().await?;
    Ok(Json(forms.iter().map(FormSummary::from).collect()))
}

/// The compiled view of one form: definition, flat schema, grouped layout.
pub async fn get_form(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let form = state
        .forms
        .get(&id)
        .await?
        .ok_or(ApiError::FormNotFound(id))?;
    let schema = FormSchema::compile(&form.definition, &state.compile);
    let layout = FormLayout::compile(&form.definition);
    Ok(Json(json!({
        "id": form.id,
        "title": form.title(),
        "definition": form.definition,
        "schema": schema.fields(),
        "layout": layout,
        "webhooks": form.webhooks,
        "recipients": form.recipients,
    })))
}

/// Replace a form's definition, webhooks and recipients.
pub async fn update_form(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<CreateFormRequest>,
) -> Result<Json<FormSummary>, ApiError> {
    let existing = state
        .forms
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::FormNotFound(id.clone()))?;
    let definition = FormDefinition::new(request.title, request.form_fields);
    check_authoring(&definition, &request.webhooks)?;
    let updated = StoredForm {
        definition,
        webhooks: request.webhooks,
        recipients: request.recipients,
        ..existing
    };
    state.forms.update(&updated).await?;
    // Re-read so the summary carries the timestamp the store just wrote.
    let fresh = state
        .forms
        .get(&id)
        .await?
        .ok_or(ApiError::FormNotFound(id))?;
    Ok(Json(FormSummary::from(&fresh)))
}

pub async fn delete_form(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.forms.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::FormNotFound(id))
    }
}

/// One uploaded file in a submission request, content base64-encoded.
#[derive(Debug, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub files: HashMap<String, FileUpload>,
    #[serde(default)]
    pub page_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: String,
    pub submit_time: String,
}

pub async fn submit_form(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let form = state
        .forms
        .get(&id)
        .await?
        .ok_or(ApiError::FormNotFound(id))?;

    let mut files = HashMap::new();
    for (key, upload) in request.files {
        let content = base64::engine::general_purpose::STANDARD
            .decode(&upload.content)
            .map_err(|_| {
                ApiError::BadRequest(format!("file content for '{}' is not valid base64", key))
            })?;
        let content_type = upload.content_type.or_else(|| {
            mime_guess::from_path(&upload.filename)
                .first_raw()
                .map(str::to_string)
        });
        files.insert(
            key,
            FilePayload {
                filename: upload.filename,
                content_type,
                content: Bytes::from(content),
            },
        );
    }

    let input = SubmissionInput {
        data: request.data,
        files,
        page_id: request.page_id,
    };

    match state.pipeline.process(&form, input).await {
        Ok(submission) => Ok((
            StatusCode::CREATED,
            Json(SubmitResponse {
                id: submission.id,
                submit_time: submission.submit_time.to_rfc3339(),
            }),
        )
            .into_response()),
        Err(SubmissionError::Invalid(errors)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": errors})),
        )
            .into_response()),
        Err(SubmissionError::Persistence(e)) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub form_id: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    #[serde(default)]
    pub from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    #[serde(default)]
    pub to: Option<String>,
}

fn parse_report_date(field: &str, value: &str, end_of_day: bool) -> Result<chrono::DateTime<Utc>, ApiError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("'{}' must be a YYYY-MM-DD date", field)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
    } else {
        NaiveTime::default()
    };
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Submissions report: filter by form and submit-time range, newest first.
pub async fn list_submissions(
    State(state): State<ApiState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let filter = SubmissionFilter {
        form_id: query.form_id,
        submitted_from: query
            .from
            .as_deref()
            .map(|v| parse_report_date("from", v, false))
            .transpose()?,
        submitted_to: query
            .to
            .as_deref()
            .map(|v| parse_report_date("to", v, true))
            .transpose()?,
    };
    Ok(Json(state.submissions.list(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: SubmissionStatus,
}

pub async fn set_submission_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<StatusCode, ApiError> {
    if state.submissions.set_status(&id, update.status).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SubmissionNotFound(id))
    }
}

pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    let database = match state.pool.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            "down"
        }
    };
    Json(json!({"status": "ok", "database": database}))
}
