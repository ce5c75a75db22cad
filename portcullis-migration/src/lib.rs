//! Versioned schema migrations
//!
//! Each storage backend defines its migrations as [`Migration`] implementations and
//! applies them through a [`MigrationManager`], which records every applied version in a
//! tracking table so that `migrate` can be run on every start.

use async_trait::async_trait;
use portcullis_core::error::StorageError;
use sqlx::Database;
use thiserror::Error;

/// Name of the table recording applied migrations.
pub const MIGRATION_TABLE: &str = "_portcullis_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for portcullis_core::Error {
    fn from(error: MigrationError) -> Self {
        StorageError::Migration(error.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix seconds
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.applied_at, 0)
    }
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back applied migrations in reverse version order
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;

    /// Highest applied version, if any
    async fn current_version(&self) -> Result<Option<i64>> {
        let applied = self.get_applied_migrations().await?;
        Ok(applied.iter().map(|m| m.version).max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_maps_to_storage_error() {
        let error: portcullis_core::Error = MigrationError::Migration("boom".into()).into();
        assert!(matches!(
            error,
            portcullis_core::Error::Storage(StorageError::Migration(ref msg)) if msg.contains("boom")
        ));
    }

    #[test]
    fn test_applied_at_conversion() {
        let record = MigrationRecord {
            version: 1,
            name: "CreateCredentialsTable".into(),
            applied_at: 1_700_000_000,
        };
        assert_eq!(record.applied_at().unwrap().timestamp(), 1_700_000_000);
    }
}
