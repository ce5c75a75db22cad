//! Axum integration for the portcullis account guard.
//!
//! Provides a login route that maps guard decisions onto HTTP status codes, plus
//! admin routes protected by a bearer access token carrying an admin role.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | Storage health check |
//! | `POST /login` | Verify credentials and issue an access token |
//! | `GET /admin/accounts/{identity}` | Lockout and block status of an account |
//! | `PUT /admin/accounts/{identity}/block` | Block or unblock an account |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portcullis::{JwtConfig, PortcullisBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let portcullis = PortcullisBuilder::new()
//!         .with_sqlite("sqlite://portcullis.db")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let app = axum::Router::new().nest("/auth", portcullis_axum::routes(Arc::new(portcullis)));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use axum::Router;
use portcullis::{Portcullis, RepositoryProvider};

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use extractors::AdminUser;
pub use middleware::{AuthState, require_admin};
pub use types::{HealthResponse, LoginRequest, LoginResponse, SetBlockedRequest};

/// Build the router for a configured [`Portcullis`] instance.
pub fn routes<R>(portcullis: Arc<Portcullis<R>>) -> Router
where
    R: RepositoryProvider + 'static,
{
    routes::create_router(portcullis)
}
