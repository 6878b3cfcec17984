//! Database migrations for the persistence layer

use crate::persistence::error::PersistenceError;
use crate::persistence::pool::ConnectionPool;
use chrono::Utc;
use sqlx::Row;

/// Migration 001: forms, submissions and uploaded files
const MIGRATION_001_INITIAL: &str = r#"
-- Forms table (editor-authored definitions)
CREATE TABLE IF NOT EXISTS forms (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    definition TEXT NOT NULL,
    webhooks TEXT NOT NULL DEFAULT '[]',
    recipients TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Submissions table (one row per validated form fill)
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    form_id TEXT NOT NULL,
    page_id TEXT,
    submit_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    form_data TEXT NOT NULL,
    FOREIGN KEY (form_id) REFERENCES forms(id)
);

-- Uploaded files (owned by exactly one submission)
CREATE TABLE IF NOT EXISTS uploaded_files (
    id TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    file_path TEXT NOT NULL,
    content_type TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (submission_id) REFERENCES submissions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_submissions_form ON submissions(form_id);
CREATE INDEX IF NOT EXISTS idx_submissions_time ON submissions(submit_time);
CREATE INDEX IF NOT EXISTS idx_uploaded_files_submission ON uploaded_files(submission_id);
"#;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        name: "001_initial_schema",
        sql: MIGRATION_001_INITIAL,
    }]
}

/// Migration runner for the persistence layer
pub struct MigrationRunner {
    pool: ConnectionPool,
}

impl MigrationRunner {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations, returning how many were applied.
    pub async fn migrate_up(&self) -> Result<usize, PersistenceError> {
        self.ensure_migrations_table().await?;

        let mut applied = 0;
        for migration in get_migrations() {
            if self.is_migration_applied(migration.name).await? {
                tracing::debug!("Migration '{}' already applied, skipping", migration.name);
                continue;
            }

            tracing::info!("Applying migration: {}", migration.name);

            // SQLite requires statements to be executed one by one
            for statement in migration.sql.split(';') {
                // Comment lines must go; a statement may start with one.
                let statement = statement
                    .lines()
                    .filter(|line| !line.trim_start().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                sqlx::query(statement)
                    .execute(self.pool.pool())
                    .await
                    .map_err(|e| {
                        PersistenceError::Migration(format!(
                            "Failed to execute migration '{}': {}",
                            migration.name, e
                        ))
                    })?;
            }

            self.record_migration(migration.name).await?;
            applied += 1;
        }
        Ok(applied)
    }

    async fn ensure_migrations_table(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _formwork_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(self.pool.pool())
        .await
        .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn is_migration_applied(&self, name: &str) -> Result<bool, PersistenceError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM _formwork_migrations WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool.pool())
            .await?;
        let count: i64 = row.try_get("n")?;
        Ok(count > 0)
    }

    async fn record_migration(&self, name: &str) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO _formwork_migrations (name, applied_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }
}
