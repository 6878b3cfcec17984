//! Outbound webhook dispatch: render a webhook config against a submission's
//! form data and perform the HTTP call.

use std::time::Duration;

use serde_json::{Map, Value};
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::{HttpMethod, WebhookConfig};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),
    #[error("rendered request body is not valid JSON: {source}")]
    BodyNotJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A webhook request with all templates rendered, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// The transport outcome, returned to the caller for logging.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Renders webhook configs and issues the outbound calls.
///
/// No retries; requests time out after the configured duration (10 seconds by
/// default). Dispatch errors are for the pipeline to log, never to propagate.
pub struct WebhookTrigger {
    client: reqwest::Client,
}

impl WebhookTrigger {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Render the URL, header values and body against the form data.
    /// A rendered body that does not parse as JSON fails the dispatch here.
    pub fn render(
        config: &WebhookConfig,
        form_data: &Map<String, Value>,
    ) -> Result<RenderedRequest, WebhookError> {
        let context = Context::from_serialize(form_data)?;
        let url = Tera::one_off(&config.url, &context, false)?;
        let headers = config
            .request_headers
            .iter()
            .map(|header| {
                Ok((
                    header.name.clone(),
                    Tera::one_off(&header.value_template, &context, false)?,
                ))
            })
            .collect::<Result<Vec<_>, WebhookError>>()?;
        let body = match &config.request_body {
            Some(template) if !template.is_empty() => {
                let rendered = Tera::one_off(template, &context, false)?;
                Some(
                    serde_json::from_str(&rendered)
                        .map_err(|source| WebhookError::BodyNotJson { source })?,
                )
            }
            _ => None,
        };
        Ok(RenderedRequest {
            method: config.method,
            url,
            headers,
            body,
        })
    }

    pub async fn dispatch(
        &self,
        request: &RenderedRequest,
    ) -> Result<WebhookResponse, WebhookError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        Ok(WebhookResponse {
            status: response.status().as_u16(),
            body: response.text().await?,
        })
    }

    /// Render and send in one step.
    pub async fn trigger(
        &self,
        config: &WebhookConfig,
        form_data: &Map<String, Value>,
    ) -> Result<WebhookResponse, WebhookError> {
        let rendered = Self::render(config, form_data)?;
        self.dispatch(&rendered).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WebhookHeader;
    use serde_json::json;

    fn form_data() -> Map<String, Value> {
        json!({"name": "ann", "email": "ann@example.com"})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn url_is_rendered_against_form_data() {
        let config = WebhookConfig {
            url: "https://x/{{ name }}".to_string(),
            method: HttpMethod::Get,
            request_headers: vec![],
            request_body: None,
        };
        let rendered = WebhookTrigger::render(&config, &form_data()).unwrap();
        assert_eq!(rendered.url, "https://x/ann");
        assert_eq!(rendered.body, None);
    }

    #[test]
    fn headers_and_body_are_rendered() {
        let config = WebhookConfig {
            url: "https://x".to_string(),
            method: HttpMethod::Post,
            request_headers: vec![WebhookHeader {
                name: "X-Submitter".to_string(),
                value_template: "{{ email }}".to_string(),
            }],
            request_body: Some(r#"{"who": "{{ name }}"}"#.to_string()),
        };
        let rendered = WebhookTrigger::render(&config, &form_data()).unwrap();
        assert_eq!(
            rendered.headers,
            vec![("X-Submitter".to_string(), "ann@example.com".to_string())]
        );
        assert_eq!(rendered.body, Some(json!({"who": "ann"})));
    }

    #[test]
    fn body_that_renders_to_invalid_json_fails() {
        let config = WebhookConfig {
            url: "https://x".to_string(),
            method: HttpMethod::Post,
            request_headers: vec![],
            request_body: Some("not json {{ name }}".to_string()),
        };
        let err = WebhookTrigger::render(&config, &form_data()).unwrap_err();
        assert!(matches!(err, WebhookError::BodyNotJson { .. }));
    }

    #[test]
    fn empty_body_template_sends_no_body() {
        let config = WebhookConfig {
            url: "https://x".to_string(),
            method: HttpMethod::Post,
            request_headers: vec![],
            request_body: Some(String::new()),
        };
        let rendered = WebhookTrigger::render(&config, &form_data()).unwrap();
        assert_eq!(rendered.body, None);
    }
}
