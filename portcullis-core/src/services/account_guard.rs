//! Account guard: login verification, temporary lockout and administrator blocking.
//!
//! Each identity is in one of three states:
//!
//! - `Active`: passwords are verified and consecutive failures are counted
//! - `Locked { until }`: entered when the counter reaches the configured threshold,
//!   left implicitly once `until` has passed or through a password reset
//! - `Blocked`: set and cleared only by an administrator, takes precedence over a lock
//!
//! Locked and blocked accounts are rejected before any password evaluation, so a
//! correct password does not reveal itself while the account is suspended.
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_core::{AccountGuard, AccountGuardConfig, AuthOutcome};
//!
//! let guard = AccountGuard::new(repository, AccountGuardConfig::default());
//!
//! match guard.verify_credentials("player@ctf.example", "hunter22").await {
//!     AuthOutcome::Accepted(login) => { /* issue a token for login.identity */ }
//!     AuthOutcome::Rejected(rejection) => { /* show rejection.public_message() */ }
//! }
//! ```

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    Error,
    auth::{AcceptedLogin, AuthOutcome, RejectReason, Rejection},
    config::AccountGuardConfig,
    credential::{AccountStatus, CredentialRecord, FailedAttempt, Identity, NewCredential, Role},
    crypto,
    error::{AuthError, StorageError},
    events::{EventBus, GuardEvent, UnlockReason},
    repositories::CredentialRepository,
    validation::{validate_block_reason, validate_password},
};

/// Service owning the login/lockout/block state machine.
///
/// The guard keeps no credential state in memory; every decision is made from a fresh
/// read of the record, so it can be shared freely across tasks.
pub struct AccountGuard<R: CredentialRepository> {
    repository: Arc<R>,
    config: AccountGuardConfig,
    events: EventBus,
}

impl<R: CredentialRepository> AccountGuard<R> {
    pub fn new(repository: Arc<R>, config: AccountGuardConfig) -> Self {
        Self {
            repository,
            config,
            events: EventBus::default(),
        }
    }

    /// Publish audit events to `events` instead of a private bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &AccountGuardConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Decide whether `secret` authenticates `identity`.
    ///
    /// Never fails: storage errors and timeouts become [`RejectReason::InternalError`].
    pub async fn verify_credentials(&self, identity: &str, secret: &str) -> AuthOutcome {
        let identity = Identity::normalize(identity);

        if identity.is_empty() {
            tracing::debug!("Rejecting login with empty identity");
            return Rejection::new(RejectReason::UnknownIdentity).into();
        }

        if secret.is_empty() {
            return self
                .reject(&identity, Rejection::new(RejectReason::BadPassword))
                .await;
        }

        let lookup = self
            .with_timeout("find_by_identity", self.repository.find_by_identity(&identity))
            .await;

        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => {
                crypto::verify_against_dummy(secret).await;
                return self
                    .reject(&identity, Rejection::new(RejectReason::UnknownIdentity))
                    .await;
            }
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Credential lookup failed");
                return self
                    .reject(&identity, Rejection::new(RejectReason::InternalError))
                    .await;
            }
        };

        let now = Utc::now();

        if record.is_blocked {
            return self
                .reject(&identity, Rejection::new(RejectReason::Blocked))
                .await;
        }

        if let Some(until) = record.locked_until.filter(|until| *until > now) {
            return self.reject(&identity, Rejection::locked(until)).await;
        }

        match crypto::verify_password(secret, &record.password_hash).await {
            Ok(true) => self.accept(record).await,
            Ok(false) => self.fail(record).await,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Password verification failed");
                self.reject(&identity, Rejection::new(RejectReason::InternalError))
                    .await
            }
        }
    }

    async fn accept(&self, record: CredentialRecord) -> AuthOutcome {
        let now = Utc::now();
        let identity = record.identity;

        let write = self
            .with_timeout("record_success", self.repository.record_success(&identity, now))
            .await;

        if let Err(e) = write {
            tracing::error!(
                identity = %identity,
                error = %e,
                "Failed to reset login state after a password match"
            );
            return self
                .reject(&identity, Rejection::new(RejectReason::InternalError))
                .await;
        }

        if record.locked_until.is_some() {
            self.emit(GuardEvent::AccountUnlocked {
                identity: identity.clone(),
                reason: UnlockReason::LockoutExpired,
                timestamp: now,
            })
            .await;
        }

        tracing::info!(identity = %identity, role = %record.role, "Login accepted");
        self.emit(GuardEvent::LoginSucceeded {
            identity: identity.clone(),
            timestamp: now,
        })
        .await;

        AuthOutcome::Accepted(AcceptedLogin {
            identity,
            role: record.role,
        })
    }

    async fn fail(&self, record: CredentialRecord) -> AuthOutcome {
        let now = Utc::now();
        let identity = record.identity;
        let threshold = self.config.threshold();

        let Some(lock_until) = now.checked_add_signed(self.config.lockout_period) else {
            tracing::error!(
                identity = %identity,
                lockout_period = %self.config.lockout_period,
                "Lockout period overflows the lock expiry timestamp"
            );
            return self
                .reject(&identity, Rejection::new(RejectReason::InternalError))
                .await;
        };

        let attempt = FailedAttempt {
            threshold,
            attempted_at: now,
            lock_until,
        };

        let write = self
            .with_timeout(
                "record_failure",
                self.repository.record_failure(&identity, attempt),
            )
            .await;

        let failure = match write {
            Ok(failure) => failure,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Failed to record failed login");
                return self
                    .reject(&identity, Rejection::new(RejectReason::InternalError))
                    .await;
            }
        };

        match failure.locked_until.filter(|until| *until > now) {
            Some(until) if !failure.newly_locked => {
                tracing::debug!(
                    identity = %identity,
                    locked_until = %until,
                    "Failed login raced with a concurrent lockout"
                );
                self.reject(&identity, Rejection::locked(until)).await
            }
            Some(until) => {
                tracing::warn!(
                    identity = %identity,
                    failed_attempts = threshold,
                    locked_until = %until,
                    "Account locked after repeated failed logins"
                );
                self.emit(GuardEvent::AccountLocked {
                    identity: identity.clone(),
                    failed_attempts: threshold,
                    locked_until: until,
                    timestamp: now,
                })
                .await;
                self.reject(&identity, Rejection::locked(until)).await
            }
            None => {
                tracing::debug!(
                    identity = %identity,
                    failed_login_count = failure.failed_login_count,
                    "Password mismatch recorded"
                );
                self.reject(&identity, Rejection::new(RejectReason::BadPassword))
                    .await
            }
        }
    }

    async fn reject(&self, identity: &Identity, rejection: Rejection) -> AuthOutcome {
        tracing::info!(identity = %identity, reason = %rejection.reason, "Login rejected");
        self.emit(GuardEvent::LoginFailed {
            identity: identity.clone(),
            reason: rejection.reason,
            timestamp: Utc::now(),
        })
        .await;
        rejection.into()
    }

    /// Block or unblock an account.
    ///
    /// Idempotent. The lock state and failure counter are left untouched. `reason` is
    /// only recorded when blocking.
    pub async fn admin_set_blocked(
        &self,
        identity: &str,
        blocked: bool,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let identity = Identity::normalize(identity);
        let reason = if blocked { reason } else { None };
        validate_block_reason(reason)?;

        let now = Utc::now();
        let found = self
            .with_timeout(
                "set_blocked",
                self.repository.set_blocked(&identity, blocked, reason, now),
            )
            .await?;

        if !found {
            return Err(AuthError::AccountNotFound.into());
        }

        let event = if blocked {
            tracing::warn!(identity = %identity, reason = ?reason, "Account blocked");
            GuardEvent::AccountBlocked {
                identity,
                reason: reason.map(str::to_string),
                timestamp: now,
            }
        } else {
            tracing::info!(identity = %identity, "Account unblocked");
            GuardEvent::AccountUnblocked {
                identity,
                timestamp: now,
            }
        };
        self.emit(event).await;

        Ok(())
    }

    /// Create a new account in the `Active` state.
    pub async fn provision_account(
        &self,
        identity: &str,
        password: &str,
        role: Role,
    ) -> Result<CredentialRecord, Error> {
        let identity = Identity::parse(identity)?;
        validate_password(password)?;

        let existing = self
            .with_timeout("find_by_identity", self.repository.find_by_identity(&identity))
            .await?;
        if existing.is_some() {
            return Err(AuthError::AccountAlreadyExists.into());
        }

        let password_hash = crypto::hash_password(password).await?;
        let credential = NewCredential {
            identity,
            password_hash,
            role,
        };

        let record = self
            .with_timeout("create", self.repository.create(credential))
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent provisioning of the same identity
                Error::Storage(StorageError::Constraint(_)) => {
                    Error::Auth(AuthError::AccountAlreadyExists)
                }
                other => other,
            })?;

        tracing::info!(identity = %record.identity, role = %record.role, "Account provisioned");
        self.emit(GuardEvent::AccountProvisioned {
            identity: record.identity.clone(),
            role: record.role,
            timestamp: record.created_at,
        })
        .await;

        Ok(record)
    }

    /// Replace an account's password and lift any lockout. A block stays in place.
    pub async fn reset_password(&self, identity: &str, new_password: &str) -> Result<(), Error> {
        let identity = Identity::normalize(identity);
        validate_password(new_password)?;

        let record = self
            .with_timeout("find_by_identity", self.repository.find_by_identity(&identity))
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let password_hash = crypto::hash_password(new_password).await?;
        let now = Utc::now();

        let found = self
            .with_timeout(
                "set_password_hash",
                self.repository
                    .set_password_hash(&identity, &password_hash, now),
            )
            .await?;
        if !found {
            return Err(AuthError::AccountNotFound.into());
        }

        tracing::info!(identity = %identity, "Password reset");
        if record.is_locked_at(now) {
            self.emit(GuardEvent::AccountUnlocked {
                identity: identity.clone(),
                reason: UnlockReason::PasswordReset,
                timestamp: now,
            })
            .await;
        }
        self.emit(GuardEvent::PasswordReset {
            identity,
            timestamp: now,
        })
        .await;

        Ok(())
    }

    /// Report the current state of an account without modifying it.
    pub async fn account_status(&self, identity: &str) -> Result<AccountStatus, Error> {
        let identity = Identity::normalize(identity);
        let record = self
            .with_timeout("find_by_identity", self.repository.find_by_identity(&identity))
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        Ok(status_at(&record, Utc::now()))
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, future: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match tokio::time::timeout(self.config.store_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation} did not complete within {:?}",
                self.config.store_timeout
            ))
            .into()),
        }
    }

    async fn emit(&self, event: GuardEvent) {
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(identity = %event.identity(), error = %e, "Failed to emit guard event");
        }
    }
}

fn status_at(record: &CredentialRecord, now: DateTime<Utc>) -> AccountStatus {
    AccountStatus {
        identity: record.identity.clone(),
        role: record.role,
        failed_login_count: record.failed_login_count,
        state: record.state_at(now),
    }
}
