//! Database models for the persistence layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{FormDefinition, WebhookConfig};
use crate::persistence::error::PersistenceError;

/// A form as stored in the database. Definition, webhooks and notification
/// recipients are JSON-serialized columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRow {
    /// Unique identifier (UUID)
    pub id: String,
    pub title: String,
    /// JSON serialized field tree
    pub definition: String,
    /// JSON serialized webhook configs
    pub webhooks: String,
    /// JSON serialized list of notification recipient addresses
    pub recipients: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// A submission as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// Unique identifier (UUID)
    pub id: String,
    pub form_id: String,
    /// Page the form was submitted from, if any
    pub page_id: Option<String>,
    /// Submission timestamp (RFC 3339), set at creation
    pub submit_time: String,
    /// new | completed
    pub status: String,
    /// JSON object keyed by compiled field key
    pub form_data: String,
}

/// A stored upload belonging to one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFileRow {
    pub id: String,
    pub submission_id: String,
    /// Compiled key of the file field this upload answered
    pub field_key: String,
    /// Storage reference returned by the file-storage backend
    pub file_path: String,
    pub content_type: Option<String>,
    pub created_at: String,
}

/// Submission lifecycle status. `New` on creation; staff may mark a
/// submission `Completed` later. The rest of a submission is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    New,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid submission status: {}", s)),
        }
    }
}

/// A decoded form ready for compilation and submission handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredForm {
    pub id: String,
    pub definition: FormDefinition,
    pub webhooks: Vec<WebhookConfig>,
    pub recipients: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredForm {
    pub fn title(&self) -> &str {
        &self.definition.title
    }
}

impl TryFrom<FormRow> for StoredForm {
    type Error = PersistenceError;

    fn try_from(row: FormRow) -> Result<Self, Self::Error> {
        let decode = |what: &str, err: serde_json::Error| PersistenceError::CorruptContent {
            entity_type: "form".to_string(),
            id: row.id.clone(),
            reason: format!("{}: {}", what, err),
        };
        Ok(Self {
            definition: FormDefinition {
                title: row.title.clone(),
                form_fields: serde_json::from_str(&row.definition)
                    .map_err(|e| decode("definition", e))?,
            },
            webhooks: serde_json::from_str(&row.webhooks).map_err(|e| decode("webhooks", e))?,
            recipients: serde_json::from_str(&row.recipients)
                .map_err(|e| decode("recipients", e))?,
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewForm {
    pub definition: FormDefinition,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// A decoded submission for API responses and side-effect dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub form_id: String,
    pub page_id: Option<String>,
    pub submit_time: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub form_data: Map<String, Value>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = PersistenceError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| PersistenceError::CorruptContent {
            entity_type: "submission".to_string(),
            id: row.id.clone(),
            reason,
        };
        Ok(Self {
            submit_time: DateTime::parse_from_rfc3339(&row.submit_time)
                .map_err(|e| corrupt(format!("submit_time: {}", e)))?
                .with_timezone(&Utc),
            status: row
                .status
                .parse()
                .map_err(|e: String| corrupt(e))?,
            form_data: serde_json::from_str(&row.form_data)
                .map_err(|e| corrupt(format!("form_data: {}", e)))?,
            id: row.id,
            form_id: row.form_id,
            page_id: row.page_id,
        })
    }
}

/// Input for creating a submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: String,
    pub page_id: Option<String>,
    pub form_data: Map<String, Value>,
}

/// Input for recording a stored upload.
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub submission_id: String,
    pub field_key: String,
    pub file_path: String,
    pub content_type: Option<String>,
}
