//! Builder pattern for constructing Portcullis instances
//!
//! This module provides a type-safe builder for creating [`Portcullis`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use portcullis::{JwtConfig, PortcullisBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let portcullis = PortcullisBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"secret".to_vec()))
//!         .with_max_failed_attempts(3)
//!         .with_lockout_period(Duration::minutes(30))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use portcullis_core::{
    AccountGuardConfig, EventBus, JwtConfig, JwtTokenIssuer, TokenIssuer,
    repositories::RepositoryProvider,
};

use crate::Portcullis;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Portcullis instance.
#[derive(Debug, thiserror::Error)]
pub enum PortcullisBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Portcullis`] instances.
///
/// Storage must be configured before `build()` becomes available, and a token issuer
/// must be configured before `build()` succeeds.
pub struct PortcullisBuilder<Storage> {
    storage: Storage,
    guard_config: AccountGuardConfig,
    events: EventBus,
    tokens: Option<Arc<dyn TokenIssuer>>,
    apply_migrations: bool,
}

impl Default for PortcullisBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl PortcullisBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Lockout: 5 consecutive failures, 15 minutes
    /// - Store timeout: 5 seconds
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            guard_config: AccountGuardConfig::default(),
            events: EventBus::default(),
            tokens: None,
            apply_migrations: false,
        }
    }

    /// Use an already constructed repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> PortcullisBuilder<WithStorage<R>> {
        PortcullisBuilder {
            storage: WithStorage { repositories },
            guard_config: self.guard_config,
            events: self.events,
            tokens: self.tokens,
            apply_migrations: self.apply_migrations,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl PortcullisBuilder<NoStorage> {
    /// Configure SQLite storage from a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<PortcullisBuilder<WithStorage<crate::SqliteRepositoryProvider>>, PortcullisBuilderError>
    {
        let provider = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| PortcullisBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(provider)))
    }

    /// Configure SQLite storage from an existing pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> PortcullisBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        let repositories = Arc::new(crate::SqliteRepositoryProvider::new(pool));
        self.with_repositories(repositories)
    }
}

// ============================================================================
// Configuration Methods (available in any state)
// ============================================================================

impl<Storage> PortcullisBuilder<Storage> {
    /// Replace the whole lockout configuration.
    pub fn with_guard_config(mut self, config: AccountGuardConfig) -> Self {
        self.guard_config = config;
        self
    }

    /// Set the number of consecutive failures that triggers a lockout.
    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.guard_config = self
            .guard_config
            .with_max_failed_attempts(max_failed_attempts);
        self
    }

    /// Set how long a lockout lasts.
    pub fn with_lockout_period(mut self, lockout_period: Duration) -> Self {
        self.guard_config = self.guard_config.with_lockout_period(lockout_period);
        self
    }

    /// Issue HS256 JWTs with the given configuration.
    pub fn with_jwt(self, config: JwtConfig) -> Self {
        self.with_token_issuer(Arc::new(JwtTokenIssuer::new(config)))
    }

    pub fn with_token_issuer(mut self, tokens: Arc<dyn TokenIssuer>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Publish audit events to an existing event bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

// ============================================================================
// Build Methods (WithStorage only)
// ============================================================================

impl<R: RepositoryProvider> PortcullisBuilder<WithStorage<R>> {
    /// Build the Portcullis instance.
    ///
    /// If `apply_migrations(true)` was called, migrations are applied before returning.
    pub async fn build(self) -> Result<Portcullis<R>, PortcullisBuilderError> {
        let tokens = self.tokens.ok_or_else(|| {
            PortcullisBuilderError::InvalidConfiguration(
                "a token issuer is required; call with_jwt or with_token_issuer".to_string(),
            )
        })?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| PortcullisBuilderError::Migration(e.to_string()))?;
        }

        Ok(Portcullis::from_parts(
            self.storage.repositories,
            self.guard_config,
            self.events,
            tokens,
        ))
    }
}
