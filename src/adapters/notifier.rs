//! Notification dispatch after a submission is persisted.
//!
//! The dispatcher is a port: deployments plug in SMTP, chat, or whatever
//! channel they use. The default implementation writes to the log so the
//! pipeline stays observable without any mail infrastructure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tera::{Context, Tera};

const DEFAULT_SUBJECT: &str = "New submission for {{ form }}";

const DEFAULT_BODY: &str = "\
{{ form }} received a new submission on {{ submit_time }}.
{% if page %}Submitted from page {{ page }}.
{% endif %}
{% for key, value in form_data %}{{ key }}: {{ value }}
{% endfor %}";

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
}

/// Render the notification for one submission. The template context carries
/// `form`, `form_data`, `page` and `submit_time`.
pub fn render_notification(
    form_title: &str,
    form_data: &Map<String, Value>,
    page_id: Option<&str>,
    submit_time: DateTime<Utc>,
    subject_template: Option<&str>,
) -> Result<NotificationMessage, tera::Error> {
    let mut context = Context::new();
    context.insert("form", form_title);
    context.insert("form_data", form_data);
    context.insert("page", &page_id);
    context.insert("submit_time", &submit_time.to_rfc3339());

    Ok(NotificationMessage {
        subject: Tera::one_off(subject_template.unwrap_or(DEFAULT_SUBJECT), &context, false)?,
        body: Tera::one_off(DEFAULT_BODY, &context, false)?,
    })
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        recipient: &str,
        message: &NotificationMessage,
    ) -> anyhow::Result<()>;
}

/// Dispatcher that records notifications in the log.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(
        &self,
        recipient: &str,
        message: &NotificationMessage,
    ) -> anyhow::Result<()> {
        tracing::info!(recipient, subject = %message.subject, "notification dispatched");
        Ok(())
    }
}
