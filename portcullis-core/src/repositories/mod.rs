//! Repository traits for the data access layer
//!
//! Services talk to storage through these traits only.
//!
//! - [`CredentialRepository`] defines the operations on credential records
//! - [`CredentialRepositoryProvider`] gives access to a backend's credential repository
//! - [`RepositoryProvider`] adds lifecycle methods for migrations and health checks

pub mod adapter;
pub mod credential;

pub use adapter::CredentialRepositoryAdapter;
pub use credential::CredentialRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for credential repository access.
pub trait CredentialRepositoryProvider: Send + Sync + 'static {
    /// The credential repository implementation type
    type CredentialRepo: CredentialRepository;

    /// Get the credential repository
    fn credentials(&self) -> &Self::CredentialRepo;
}

/// Provider trait that storage implementations must implement.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl CredentialRepositoryProvider for MyStorage {
///     type CredentialRepo = MyCredentialRepository;
///     fn credentials(&self) -> &Self::CredentialRepo { &self.credentials }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: CredentialRepositoryProvider {
    /// Run pending schema migrations
    async fn migrate(&self) -> Result<(), Error>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<(), Error>;
}
