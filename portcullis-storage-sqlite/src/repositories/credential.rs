//! SQLite implementation of the credential repository.
//!
//! Timestamps are stored as INTEGER unix seconds. Login attempt writes are single
//! conditional `UPDATE` statements, so concurrent attempts against the same identity
//! never interleave a read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{
    CredentialRecord, Error, FailedAttempt, FailureRecord, Identity, NewCredential, Role,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::CredentialRepository,
};
use sqlx::SqlitePool;

/// SQLite repository for credential records.
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteCredential {
    identity: String,
    password_hash: String,
    failed_login_count: i64,
    locked_until: Option<i64>,
    is_blocked: bool,
    blocked_reason: Option<String>,
    blocked_at: Option<i64>,
    role: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteCredential> for CredentialRecord {
    type Error = Error;

    fn try_from(row: SqliteCredential) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|_| {
            StorageError::Database(format!("Invalid role stored for {}", row.identity))
        })?;

        Ok(CredentialRecord {
            identity: Identity::normalize(&row.identity),
            password_hash: row.password_hash,
            failed_login_count: count_from_row(row.failed_login_count),
            locked_until: row.locked_until.map(timestamp).transpose()?,
            is_blocked: row.is_blocked,
            blocked_reason: row.blocked_reason,
            blocked_at: row.blocked_at.map(timestamp).transpose()?,
            role,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteFailureRecord {
    failed_login_count: i64,
    locked_until: Option<i64>,
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| StorageError::Database(format!("Invalid timestamp: {seconds}")).into())
}

fn count_from_row(count: i64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

const CREDENTIAL_COLUMNS: &str = "identity, password_hash, failed_login_count, locked_until, \
     is_blocked, blocked_reason, blocked_at, role, created_at, updated_at";

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn create(&self, credential: NewCredential) -> Result<CredentialRecord, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteCredential>(&format!(
            r#"
            INSERT INTO credentials (identity, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {CREDENTIAL_COLUMNS}
            "#
        ))
        .bind(credential.identity.as_str())
        .bind(credential.password_hash.as_str())
        .bind(credential.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Constraint(format!("Identity {} already exists", credential.identity))
            }
            e => {
                tracing::error!(error = %e, "Failed to create credential");
                StorageError::Database("Failed to create credential".to_string())
            }
        })?;

        row.try_into()
    }

    async fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> Result<Option<CredentialRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteCredential>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE identity = ?"
        ))
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find credential");
            StorageError::Database("Failed to find credential".to_string())
        })?;

        row.map(CredentialRecord::try_from).transpose()
    }

    async fn record_failure(
        &self,
        identity: &Identity,
        attempt: FailedAttempt,
    ) -> Result<FailureRecord, Error> {
        // Only a row without an active lock is counted; an expired lock is discarded
        let updated = sqlx::query_as::<_, SqliteFailureRecord>(
            r#"
            UPDATE credentials
            SET failed_login_count = CASE
                    WHEN failed_login_count + 1 >= ?3 THEN 0
                    ELSE failed_login_count + 1
                END,
                locked_until = CASE
                    WHEN failed_login_count + 1 >= ?3 THEN ?4
                    ELSE NULL
                END,
                updated_at = ?2
            WHERE identity = ?1
              AND (locked_until IS NULL OR locked_until <= ?2)
            RETURNING failed_login_count, locked_until
            "#,
        )
        .bind(identity.as_str())
        .bind(attempt.attempted_at.timestamp())
        .bind(i64::from(attempt.threshold))
        .bind(attempt.lock_until.timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record failed login");
            StorageError::Database("Failed to record failed login".to_string())
        })?;

        if let Some(row) = updated {
            let locked_until = row.locked_until.map(timestamp).transpose()?;
            return Ok(FailureRecord {
                failed_login_count: count_from_row(row.failed_login_count),
                newly_locked: locked_until.is_some(),
                locked_until,
            });
        }

        // Locked by a concurrent attempt after our read, or gone entirely
        let row = sqlx::query_as::<_, SqliteFailureRecord>(
            "SELECT failed_login_count, locked_until FROM credentials WHERE identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to read login state");
            StorageError::Database("Failed to read login state".to_string())
        })?
        .ok_or(StorageError::NotFound)?;

        Ok(FailureRecord {
            failed_login_count: count_from_row(row.failed_login_count),
            locked_until: row.locked_until.map(timestamp).transpose()?,
            newly_locked: false,
        })
    }

    async fn record_success(&self, identity: &Identity, at: DateTime<Utc>) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET failed_login_count = 0, locked_until = NULL, updated_at = ?
            WHERE identity = ?
            "#,
        )
        .bind(at.timestamp())
        .bind(identity.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to reset login state");
            StorageError::Database("Failed to reset login state".to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }

        Ok(())
    }

    async fn set_blocked(
        &self,
        identity: &Identity,
        blocked: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let query = if blocked {
            sqlx::query(
                r#"
                UPDATE credentials
                SET is_blocked = 1,
                    blocked_reason = ?,
                    blocked_at = COALESCE(blocked_at, ?),
                    updated_at = ?
                WHERE identity = ?
                "#,
            )
            .bind(reason)
            .bind(at.timestamp())
        } else {
            sqlx::query(
                r#"
                UPDATE credentials
                SET is_blocked = 0, blocked_reason = NULL, blocked_at = NULL, updated_at = ?
                WHERE identity = ?
                "#,
            )
        };

        let result = query
            .bind(at.timestamp())
            .bind(identity.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to update block state")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(
        &self,
        identity: &Identity,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET password_hash = ?, failed_login_count = 0, locked_until = NULL, updated_at = ?
            WHERE identity = ?
            "#,
        )
        .bind(password_hash)
        .bind(at.timestamp())
        .bind(identity.as_str())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to update password hash")?;

        Ok(result.rows_affected() > 0)
    }
}
