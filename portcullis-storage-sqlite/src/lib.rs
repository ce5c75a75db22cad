//! SQLite storage backend for portcullis
//!
//! ```rust,ignore
//! use portcullis_core::repositories::RepositoryProvider;
//! use portcullis_storage_sqlite::SqliteRepositoryProvider;
//!
//! let provider = SqliteRepositoryProvider::connect("sqlite://portcullis.db").await?;
//! provider.migrate().await?;
//! ```
pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteCredentialRepository, SqliteRepositoryProvider};
