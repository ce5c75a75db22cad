//! Portcullis is the account protection layer of a CTF learning platform.
//!
//! It tracks failed login attempts per identity, locks an account temporarily once too
//! many consecutive attempts fail, lets administrators block accounts indefinitely, and
//! verifies salted password hashes. Accepted logins receive a signed access token.
//!
//! # Example
//!
//! ```rust,no_run
//! use portcullis::{JwtConfig, LoginOutcome, PortcullisBuilder, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let portcullis = PortcullisBuilder::new()
//!         .with_sqlite("sqlite://portcullis.db")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me-to-a-long-random-secret".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     portcullis
//!         .provision_account("player@ctf.example", "correct-horse-battery", Role::User)
//!         .await?;
//!
//!     match portcullis.login("player@ctf.example", "correct-horse-battery").await {
//!         LoginOutcome::Granted { token, .. } => println!("token: {}", token.token),
//!         LoginOutcome::Denied(rejection) => println!("{}", rejection.public_message()),
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

pub mod builder;

pub use builder::{NoStorage, PortcullisBuilder, PortcullisBuilderError, WithStorage};

pub use portcullis_core::{
    AcceptedLogin, AccountGuard, AccountGuardConfig, AccountState, AccountStatus, AuthOutcome,
    CredentialRecord, Error, EventBus, EventHandler, GuardEvent, Identity, IssuedToken,
    JwtConfig, JwtTokenIssuer, RejectReason, Rejection, Role, TokenClaims, TokenIssuer,
    MAX_LOCKOUT_MINUTES, UnlockReason,
    error::{AuthError, EventError, StorageError, ValidationError},
    repositories::{CredentialRepositoryAdapter, RepositoryProvider},
};

#[cfg(feature = "sqlite")]
pub use portcullis_storage_sqlite::SqliteRepositoryProvider;

/// The guard type used by [`Portcullis`] for a given storage backend.
pub type Guard<R> = AccountGuard<CredentialRepositoryAdapter<R>>;

/// Result of a login through [`Portcullis::login`].
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Granted {
        identity: Identity,
        role: Role,
        token: IssuedToken,
    },
    Denied(Rejection),
}

/// Coordinates the account guard, the token issuer and the storage backend.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use portcullis::{JwtConfig, JwtTokenIssuer, Portcullis, SqliteRepositoryProvider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
///     let tokens = Arc::new(JwtTokenIssuer::new(JwtConfig::new_hs256(b"secret".to_vec())));
///
///     let portcullis = Portcullis::new(repositories, tokens);
///     portcullis.migrate().await?;
///     Ok(())
/// }
/// ```
pub struct Portcullis<R: RepositoryProvider> {
    repositories: Arc<R>,
    guard: Arc<Guard<R>>,
    tokens: Arc<dyn TokenIssuer>,
}

impl<R: RepositoryProvider> Portcullis<R> {
    /// Create a new instance with the default lockout configuration
    pub fn new(repositories: Arc<R>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self::from_parts(
            repositories,
            AccountGuardConfig::default(),
            EventBus::default(),
            tokens,
        )
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: AccountGuardConfig,
        events: EventBus,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let credentials = Arc::new(CredentialRepositoryAdapter::new(repositories.clone()));
        let guard = AccountGuard::new(credentials, config).with_event_bus(events);

        Self {
            repositories,
            guard: Arc::new(guard),
            tokens,
        }
    }

    /// The account guard, for callers that only need the decision
    pub fn guard(&self) -> &Guard<R> {
        &self.guard
    }

    pub fn event_bus(&self) -> &EventBus {
        self.guard.event_bus()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Verify credentials and issue an access token on acceptance.
    ///
    /// A token signing failure after an accepted verification is reported as
    /// [`RejectReason::InternalError`].
    pub async fn login(&self, identity: &str, secret: &str) -> LoginOutcome {
        match self.guard.verify_credentials(identity, secret).await {
            AuthOutcome::Accepted(AcceptedLogin { identity, role }) => {
                match self.tokens.issue(&identity, role) {
                    Ok(token) => LoginOutcome::Granted {
                        identity,
                        role,
                        token,
                    },
                    Err(e) => {
                        tracing::error!(identity = %identity, error = %e, "Failed to issue access token");
                        LoginOutcome::Denied(Rejection::new(RejectReason::InternalError))
                    }
                }
            }
            AuthOutcome::Rejected(rejection) => LoginOutcome::Denied(rejection),
        }
    }

    /// Verify an access token issued by [`Portcullis::login`]
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.tokens.verify(token)
    }

    /// Create a new account
    pub async fn provision_account(
        &self,
        identity: &str,
        password: &str,
        role: Role,
    ) -> Result<CredentialRecord, Error> {
        self.guard.provision_account(identity, password, role).await
    }

    /// Block or unblock an account
    pub async fn admin_set_blocked(
        &self,
        identity: &str,
        blocked: bool,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.guard.admin_set_blocked(identity, blocked, reason).await
    }

    /// Replace a password and lift any lockout
    pub async fn reset_password(&self, identity: &str, new_password: &str) -> Result<(), Error> {
        self.guard.reset_password(identity, new_password).await
    }

    pub async fn account_status(&self, identity: &str) -> Result<AccountStatus, Error> {
        self.guard.account_status(identity).await
    }
}

#[cfg(feature = "sqlite")]
impl Portcullis<SqliteRepositoryProvider> {
    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.repositories.close().await;
    }
}
