//! Core functionality for the portcullis account guard
//!
//! This crate contains the credential record types, the [`AccountGuard`] service that
//! owns the login/lockout/block state machine, password hashing, token issuance and
//! the audit event bus.
//!
//! Storage backends implement [`repositories::CredentialRepository`] and
//! [`repositories::RepositoryProvider`]; see `portcullis-storage-sqlite`.
pub mod auth;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod token;
pub mod validation;

pub use auth::{AcceptedLogin, AuthOutcome, RejectReason, Rejection};
pub use config::{AccountGuardConfig, MAX_LOCKOUT_MINUTES};
pub use credential::{
    AccountState, AccountStatus, CredentialRecord, FailedAttempt, FailureRecord, Identity,
    NewCredential, Role,
};
pub use error::Error;
pub use events::{EventBus, EventHandler, GuardEvent, UnlockReason};
pub use services::AccountGuard;
pub use token::{IssuedToken, JwtConfig, JwtTokenIssuer, TokenClaims, TokenIssuer};
