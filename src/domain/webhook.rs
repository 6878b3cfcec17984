//! Webhook configuration blocks attached to a form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One request header: a fixed name and a templated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookHeader {
    pub name: String,
    pub value_template: String,
}

/// An outbound call fired after a submission is persisted. The URL, header
/// values and body are templates rendered against the submission's form data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_headers: Vec<WebhookHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
}

/// Authoring-time template problems, surfaced at the offending field.
#[derive(Debug, Error)]
pub enum WebhookConfigError {
    #[error("invalid template in '{field}': {source}")]
    TemplateSyntax {
        field: String,
        #[source]
        source: tera::Error,
    },
}

impl WebhookConfig {
    /// Save-time check that every template in the block parses. A syntax
    /// error is reported against the field holding the template rather than
    /// being dropped.
    pub fn validate(&self) -> Result<(), WebhookConfigError> {
        check_template("url", &self.url)?;
        for header in &self.request_headers {
            check_template(&header.name, &header.value_template)?;
        }
        if let Some(body) = &self.request_body {
            if !body.is_empty() {
                check_template("request_body", body)?;
            }
        }
        Ok(())
    }
}

fn check_template(field: &str, template: &str) -> Result<(), WebhookConfigError> {
    let mut tera = tera::Tera::default();
    tera.add_raw_template("inline", template)
        .map_err(|source| WebhookConfigError::TemplateSyntax {
            field: field.to_string(),
            source,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_templates_pass() {
        let webhook = WebhookConfig {
            url: "https://example.com/{{ name }}".to_string(),
            method: HttpMethod::Post,
            request_headers: vec![WebhookHeader {
                name: "X-Token".to_string(),
                value_template: "{{ token }}".to_string(),
            }],
            request_body: Some("{\"name\": \"{{ name }}\"}".to_string()),
        };
        assert!(webhook.validate().is_ok());
    }

    #[test]
    fn body_syntax_error_names_the_field() {
        let webhook = WebhookConfig {
            url: "https://example.com".to_string(),
            method: HttpMethod::Post,
            request_headers: vec![],
            request_body: Some("{{ unclosed".to_string()),
        };
        let err = webhook.validate().unwrap_err();
        assert!(err.to_string().contains("request_body"));
    }

    #[test]
    fn method_defaults_to_get() {
        let webhook: WebhookConfig =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(webhook.method, HttpMethod::Get);
    }
}
