//! Repository trait for credential records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    credential::{CredentialRecord, FailedAttempt, FailureRecord, Identity, NewCredential},
};

/// Storage operations backing the account guard.
///
/// Every mutation the guard performs on a login attempt is a single call here, so a
/// backend can make it one atomic statement. Identities passed in are already
/// normalized.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Insert a new credential record with a zero counter, no lock and no block.
    ///
    /// Returns `StorageError::Constraint` if the identity already exists.
    async fn create(&self, credential: NewCredential) -> Result<CredentialRecord, Error>;

    async fn find_by_identity(&self, identity: &Identity)
    -> Result<Option<CredentialRecord>, Error>;

    /// Atomically record a failed attempt.
    ///
    /// Increments `failed_login_count`, discarding any expired lock first. When the
    /// incremented counter reaches `attempt.threshold` the counter is reset to zero and
    /// `locked_until` is set to `attempt.lock_until` and `newly_locked` is reported.
    /// A record that is already locked at `attempt.attempted_at` is returned unchanged
    /// with `newly_locked == false`.
    ///
    /// Returns `StorageError::NotFound` if the identity does not exist.
    async fn record_failure(
        &self,
        identity: &Identity,
        attempt: FailedAttempt,
    ) -> Result<FailureRecord, Error>;

    /// Atomically reset `failed_login_count` to zero and clear `locked_until`.
    ///
    /// Returns `StorageError::NotFound` if the identity does not exist.
    async fn record_success(&self, identity: &Identity, at: DateTime<Utc>) -> Result<(), Error>;

    /// Set or clear the administrator block.
    ///
    /// Blocking records `reason` and keeps the original `blocked_at` if the account was
    /// already blocked; unblocking clears both. Lock state is never touched.
    ///
    /// Returns `false` if the identity does not exist.
    async fn set_blocked(
        &self,
        identity: &Identity,
        blocked: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Replace the password hash, clearing the failure counter and any lock.
    ///
    /// Returns `false` if the identity does not exist.
    async fn set_password_hash(
        &self,
        identity: &Identity,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error>;
}
