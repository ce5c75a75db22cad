use axum::{extract::FromRequestParts, http::request::Parts};
use portcullis::TokenClaims;

use crate::error::ApiError;

/// The verified claims of the administrator making the request.
///
/// Only available on routes behind [`crate::middleware::require_admin`].
#[derive(Debug, Clone)]
pub struct AdminUser(pub TokenClaims);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TokenClaims>()
            .cloned()
            .map(AdminUser)
            .ok_or(ApiError::Unauthorized)
    }
}
