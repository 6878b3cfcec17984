use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use formwork::adapters::api_handler::ApiState;
use formwork::adapters::notifier::LogDispatcher;
use formwork::adapters::webhook::WebhookTrigger;
use formwork::compiler::CompileOptions;
use formwork::config::FormsSettings;
use formwork::persistence::{
    ConnectionPool, MigrationRunner, SqlFormRepository, SqlSubmissionRepository,
};
use formwork::pipeline::{PipelineOptions, SubmissionPipeline};
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// App over a fresh in-memory database. One pooled connection, so every
/// statement sees the same sqlite instance.
async fn test_app(forms: FormsSettings) -> axum::Router {
    let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();
    MigrationRunner::new(pool.clone()).migrate_up().await.unwrap();

    let form_repo = Arc::new(SqlFormRepository::new(pool.clone()));
    let submission_repo = Arc::new(SqlSubmissionRepository::new(pool.clone()));
    let pipeline = Arc::new(SubmissionPipeline::new(
        submission_repo.clone(),
        None,
        Arc::new(LogDispatcher),
        WebhookTrigger::new(Duration::from_secs(1)).unwrap(),
        PipelineOptions {
            compile: CompileOptions::default(),
            notifications_enabled: false,
            notification_subject: None,
        },
    ));

    let state = ApiState {
        forms: form_repo,
        submissions: submission_repo,
        pipeline,
        pool,
        compile: CompileOptions::default(),
    };
    formwork::create_app(state, &forms)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn contact_form() -> Value {
    json!({
        "title": "Contact",
        "form_fields": [
            {"type": "singleline", "value": {"label": "Name"}},
            {"type": "fieldset", "value": {
                "legend": "Details",
                "form_fields": [
                    {"type": "email", "value": {"label": "Email"}}
                ]
            }}
        ]
    })
}

#[tokio::test]
async fn form_lifecycle_over_the_api() {
    let app = test_app(FormsSettings::default()).await;

    // Create
    let response = app
        .clone()
        .oneshot(post("/api/forms", contact_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["title"], "Contact");

    // Fetch: definition plus compiled schema and layout
    let response = app
        .clone()
        .oneshot(get(&format!("/api/forms/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let form = body_json(response).await;
    let keys: Vec<&str> = form["schema"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["name", "details.email"]);
    assert_eq!(form["layout"]["nodes"][1]["type"], "fieldset");

    // Submit valid data
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/forms/{}/submissions", id),
            json!({"data": {"name": "Ann", "details.email": "ann@example.com"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Submit invalid data
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/forms/{}/submissions", id),
            json!({"data": {"details.email": "nope"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let errors = body_json(response).await;
    assert!(errors["errors"]["name"].is_array());

    // Report shows the one accepted submission
    let response = app
        .clone()
        .oneshot(get(&format!("/api/submissions?form_id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report.as_array().unwrap().len(), 1);
    assert_eq!(report[0]["form_data"]["name"], "Ann");

    // Delete
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/forms/{}", id))
                .method("DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/api/forms/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_definitions_are_rejected_at_save_time() {
    let app = test_app(FormsSettings::default()).await;

    // Duplicate compiled key
    let response = app
        .clone()
        .oneshot(post(
            "/api/forms",
            json!({
                "title": "Broken",
                "form_fields": [
                    {"type": "singleline", "value": {"label": "Name"}},
                    {"type": "email", "value": {"label": "Name"}}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["problems"][0]
        .as_str()
        .unwrap()
        .contains("duplicate compiled field key"));

    // Unknown field type fails JSON decoding outright
    let response = app
        .oneshot(post(
            "/api/forms",
            json!({
                "title": "Broken",
                "form_fields": [{"type": "hologram", "value": {"label": "X"}}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn disabling_reports_keeps_status_edits_available() {
    let forms = FormsSettings {
        reports: false,
        ..FormsSettings::default()
    };
    let app = test_app(forms).await;

    let response = app
        .clone()
        .oneshot(get("/api/submissions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The status route is not part of the report view.
    let response = app
        .clone()
        .oneshot(post("/api/forms", contact_form()))
        .await
        .unwrap();
    let form_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/forms/{}/submissions", form_id),
            json!({"data": {"name": "Ann", "details.email": "ann@example.com"}}),
        ))
        .await
        .unwrap();
    let submission_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .uri(format!("/api/submissions/{}/status", submission_id))
        .method("PUT")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"status": "completed"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn api_responses_carry_never_cache_headers() {
    let app = test_app(FormsSettings::default()).await;

    let response = app.oneshot(get("/api/forms")).await.unwrap();
    assert_eq!(
        response.headers()["cache-control"],
        "max-age=0, no-cache, no-store, must-revalidate, private"
    );
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app(FormsSettings::default()).await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "ok", "database": "up"})
    );
}
