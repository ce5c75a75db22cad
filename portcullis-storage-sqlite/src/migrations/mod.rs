use async_trait::async_trait;
use chrono::Utc;
use portcullis_migration::{Migration, MigrationError, MigrationManager, MigrationRecord};
use sqlx::{Database, Sqlite, SqlitePool};

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Every migration for the SQLite backend, in version order.
pub fn all() -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![Box::new(CreateCredentialsTable), Box::new(AddBlockAuditColumns)]
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        let mut ordered: Vec<_> = migrations.iter().collect();
        ordered.sort_by_key(|migration| migration.version());

        for migration in ordered {
            if self.is_applied(migration.version()).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;

            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );

            migration
                .up(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "INSERT INTO {} (version, name, applied_at) VALUES (?, ?, ?)",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(migration.version())
            .bind(migration.name())
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        let mut ordered: Vec<_> = migrations.iter().collect();
        ordered.sort_by_key(|migration| std::cmp::Reverse(migration.version()));

        for migration in ordered {
            if !self.is_applied(migration.version()).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;

            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Rolling back migration"
            );

            migration
                .down(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "DELETE FROM {} WHERE version = ?",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(migration.version())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let records = sqlx::query_as::<_, MigrationRecord>(
            format!(
                "SELECT version, name, applied_at FROM {} ORDER BY version",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn is_applied(&self, version: i64) -> Result<bool, MigrationError> {
        let result: bool = sqlx::query_scalar(
            format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE version = ?)",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }
}

pub struct CreateCredentialsTable;

#[async_trait]
impl Migration<Sqlite> for CreateCredentialsTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateCredentialsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                identity TEXT PRIMARY KEY NOT NULL,
                password_hash TEXT NOT NULL,
                failed_login_count INTEGER NOT NULL DEFAULT 0 CHECK (failed_login_count >= 0),
                locked_until INTEGER,
                is_blocked INTEGER NOT NULL DEFAULT 0,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin', 'superadmin')),
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS credentials")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct AddBlockAuditColumns;

#[async_trait]
impl Migration<Sqlite> for AddBlockAuditColumns {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "AddBlockAuditColumns"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("ALTER TABLE credentials ADD COLUMN blocked_reason TEXT")
            .execute(&mut *conn)
            .await?;
        sqlx::query("ALTER TABLE credentials ADD COLUMN blocked_at INTEGER")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("ALTER TABLE credentials DROP COLUMN blocked_at")
            .execute(&mut *conn)
            .await?;
        sqlx::query("ALTER TABLE credentials DROP COLUMN blocked_reason")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test() {
        let _ = tracing_subscriber::fmt().try_init();
    }

    async fn manager() -> SqliteMigrationManager {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        SqliteMigrationManager::new(pool)
    }

    #[tokio::test]
    async fn test_migrations() -> Result<(), MigrationError> {
        setup_test();
        let manager = manager().await;

        manager.initialize().await?;

        let migrations = all();
        manager.up(&migrations).await?;

        assert!(manager.is_applied(1).await?);
        assert!(manager.is_applied(2).await?);
        assert_eq!(manager.current_version().await?, Some(2));

        let applied = manager.get_applied_migrations().await?;
        let names: Vec<_> = applied.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["CreateCredentialsTable", "AddBlockAuditColumns"]);

        manager.down(&migrations).await?;

        assert!(!manager.is_applied(1).await?);
        assert_eq!(manager.current_version().await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_up_is_idempotent() -> Result<(), MigrationError> {
        setup_test();
        let manager = manager().await;
        manager.initialize().await?;
        manager.initialize().await?;

        let migrations = all();
        manager.up(&migrations).await?;
        manager.up(&migrations).await?;

        assert_eq!(manager.get_applied_migrations().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_up_down_up() -> Result<(), MigrationError> {
        setup_test();
        let manager = manager().await;
        manager.initialize().await?;

        let migrations = all();
        manager.up(&migrations).await?;
        manager.down(&migrations).await?;
        manager.up(&migrations).await?;

        assert!(manager.is_applied(2).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_order_input_is_applied_by_version() -> Result<(), MigrationError> {
        setup_test();
        let manager = manager().await;
        manager.initialize().await?;

        let migrations: Vec<Box<dyn Migration<Sqlite>>> =
            vec![Box::new(AddBlockAuditColumns), Box::new(CreateCredentialsTable)];
        manager.up(&migrations).await?;

        assert_eq!(manager.current_version().await?, Some(2));
        Ok(())
    }
}
