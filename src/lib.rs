//! # Formwork - Dynamic Form Builder
//!
//! Formwork is a form builder and submission service. Editors author a form
//! as a tree of field blocks grouped by fieldsets and rows; the service
//! compiles the tree into a flat validation schema and a presentation layout,
//! validates submissions against it, and runs the side effects (file storage,
//! notifications, outbound webhooks) after each accepted submission.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formwork::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let settings = Settings::new()?;
//!
//!     // Server will start on configured host:port
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: the field-block tree and webhook configs
//! - **Compiler**: definition tree to schema and layout
//! - **Pipeline**: validation and side effects for one submission
//! - **Adapters**: HTTP API, file storage, notifications, webhooks
//! - **Persistence**: forms, submissions and uploads over sqlx

pub mod adapters;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod pipeline;

use axum::http::header::{CACHE_CONTROL, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::adapters::api_handler::{self, ApiState};
use crate::config::FormsSettings;

/// Form responses must never come from a cache: submissions and validation
/// state are per-request.
async fn never_cache(request: axum::extract::Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static("max-age=0, no-cache, no-store, must-revalidate, private"),
    );
    response
}

/// Creates the Axum application router with all endpoints configured.
pub fn create_app(state: ApiState, forms: &FormsSettings) -> Router {
    let mut api = Router::new()
        .route(
            "/forms",
            post(api_handler::create_form).get(api_handler::list_forms),
        )
        .route(
            "/forms/:id",
            get(api_handler::get_form)
                .put(api_handler::update_form)
                .delete(api_handler::delete_form),
        )
        .route("/forms/:id/submissions", post(api_handler::submit_form))
        .route(
            "/submissions/:id/status",
            put(api_handler::set_submission_status),
        );

    if forms.reports {
        api = api.route("/submissions", get(api_handler::list_submissions));
    }

    if forms.add_never_cache_headers {
        api = api.layer(middleware::from_fn(never_cache));
    }

    Router::new()
        .route("/health", get(api_handler::health))
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
}
