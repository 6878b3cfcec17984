use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use formwork::adapters::api_handler::ApiState;
use formwork::adapters::file_storage::{FileStorage, LocalFileStorage};
use formwork::adapters::notifier::LogDispatcher;
use formwork::adapters::webhook::WebhookTrigger;
use formwork::cli::Cli;
use formwork::config::Settings;
use formwork::persistence::{
    ConnectionPool, MigrationRunner, SqlFormRepository, SqlSubmissionRepository,
};
use formwork::pipeline::{PipelineOptions, SubmissionPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    info!(
        "Starting Formwork on {}:{}",
        settings.server.host, settings.server.port
    );

    let pool = ConnectionPool::new(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.connect_timeout_secs,
    )
    .await?;
    MigrationRunner::new(pool.clone()).migrate_up().await?;

    let forms = Arc::new(SqlFormRepository::new(pool.clone()));
    let submissions = Arc::new(SqlSubmissionRepository::new(pool.clone()));

    let file_storage: Option<Arc<dyn FileStorage>> = match &settings.storage {
        Some(storage) => Some(Arc::new(LocalFileStorage::new(Path::new(&storage.root))?)),
        None => None,
    };

    let pipeline = Arc::new(SubmissionPipeline::new(
        submissions.clone(),
        file_storage,
        Arc::new(LogDispatcher),
        WebhookTrigger::new(Duration::from_secs(settings.webhooks.timeout_secs))?,
        PipelineOptions {
            compile: formwork::compiler::CompileOptions {
                help_text_allow_html: settings.forms.help_text_allow_html,
            },
            notifications_enabled: settings.notifications.enabled,
            notification_subject: settings.notifications.subject.clone(),
        },
    ));

    let state = ApiState {
        forms,
        submissions,
        pipeline,
        pool,
        compile: formwork::compiler::CompileOptions {
            help_text_allow_html: settings.forms.help_text_allow_html,
        },
    };

    let app = formwork::create_app(state, &settings.forms);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
