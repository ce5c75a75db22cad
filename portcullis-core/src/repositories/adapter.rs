use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    credential::{CredentialRecord, FailedAttempt, FailureRecord, Identity, NewCredential},
    repositories::{CredentialRepository, RepositoryProvider},
};

/// Adapter that wraps a RepositoryProvider and implements [`CredentialRepository`]
pub struct CredentialRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> CredentialRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> CredentialRepository for CredentialRepositoryAdapter<R> {
    async fn create(&self, credential: NewCredential) -> Result<CredentialRecord, Error> {
        self.provider.credentials().create(credential).await
    }

    async fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> Result<Option<CredentialRecord>, Error> {
        self.provider.credentials().find_by_identity(identity).await
    }

    async fn record_failure(
        &self,
        identity: &Identity,
        attempt: FailedAttempt,
    ) -> Result<FailureRecord, Error> {
        self.provider
            .credentials()
            .record_failure(identity, attempt)
            .await
    }

    async fn record_success(&self, identity: &Identity, at: DateTime<Utc>) -> Result<(), Error> {
        self.provider.credentials().record_success(identity, at).await
    }

    async fn set_blocked(
        &self,
        identity: &Identity,
        blocked: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.provider
            .credentials()
            .set_blocked(identity, blocked, reason, at)
            .await
    }

    async fn set_password_hash(
        &self,
        identity: &Identity,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.provider
            .credentials()
            .set_password_hash(identity, password_hash, at)
            .await
    }
}
