//! Repository implementations for SQLite storage

pub mod credential;

pub use credential::SqliteCredentialRepository;

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use portcullis_core::{
    Error,
    error::StorageError,
    repositories::{CredentialRepositoryProvider, RepositoryProvider},
};
use portcullis_migration::MigrationManager;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::migrations::{self, SqliteMigrationManager};

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    credentials: Arc<SqliteCredentialRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let credentials = Arc::new(SqliteCredentialRepository::new(pool.clone()));

        Self { pool, credentials }
    }

    /// Open a pool for `url`, creating the database file if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Connection(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to SQLite");
                StorageError::Connection(e.to_string())
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection, waiting for in-flight queries to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl CredentialRepositoryProvider for SqliteRepositoryProvider {
    type CredentialRepo = SqliteCredentialRepository;

    fn credentials(&self) -> &Self::CredentialRepo {
        &self.credentials
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
