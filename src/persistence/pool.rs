//! Database connection pool management

use crate::persistence::error::PersistenceError;
use sqlx::{any::AnyPoolOptions, AnyPool};
use std::time::Duration;

/// Database backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Mysql,
}

impl DatabaseBackend {
    /// Detect the database backend from a connection URL
    pub fn from_url(url: &str) -> Result<Self, PersistenceError> {
        if url.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(Self::Postgres)
        } else if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            Ok(Self::Mysql)
        } else {
            Err(PersistenceError::Connection(format!(
                "Unsupported database URL scheme '{}'. Expected sqlite://, postgres://, or mysql://",
                url.split(':').next().unwrap_or("unknown")
            )))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Postgres => "PostgreSQL",
            Self::Mysql => "MySQL",
        }
    }
}

/// Connection pool wrapper with backend information
#[derive(Clone)]
pub struct ConnectionPool {
    pool: AnyPool,
    backend: DatabaseBackend,
}

impl ConnectionPool {
    /// Create a new connection pool from a database URL
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, PersistenceError> {
        sqlx::any::install_default_drivers();

        let backend = DatabaseBackend::from_url(url)?;

        tracing::info!(
            "Connecting to {} database with max {} connections",
            backend.name(),
            max_connections
        );

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        Ok(Self { pool, backend })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Connection(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
