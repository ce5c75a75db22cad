use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use portcullis::{AccountState, Portcullis, RepositoryProvider};

use crate::error::ApiError;

pub struct AuthState<R: RepositoryProvider> {
    pub portcullis: Arc<Portcullis<R>>,
}

impl<R: RepositoryProvider> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            portcullis: self.portcullis.clone(),
        }
    }
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Reject requests that do not carry a valid access token for an admin role.
///
/// The token subject must still exist, hold an admin role and not be blocked.
///
/// On success the verified [`portcullis::TokenClaims`] are stored in the request
/// extensions for [`crate::AdminUser`].
pub async fn require_admin<R>(
    State(state): State<AuthState<R>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    R: RepositoryProvider,
{
    let token = extract_bearer_token(&request).ok_or(ApiError::Unauthorized)?;

    let claims = state.portcullis.verify_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        ApiError::Unauthorized
    })?;

    if !claims.role.is_admin() {
        tracing::warn!(
            subject = %claims.sub,
            role = %claims.role,
            "Non-admin token used on an admin route"
        );
        return Err(ApiError::Forbidden);
    }

    // The token outlives a block, so the account itself is re-read on every request
    match state.portcullis.account_status(&claims.sub).await {
        Ok(status) if matches!(status.state, AccountState::Blocked { .. }) => {
            tracing::warn!(subject = %claims.sub, "Blocked admin used an admin route");
            return Err(ApiError::Forbidden);
        }
        Ok(status) if !status.role.is_admin() => {
            tracing::warn!(subject = %claims.sub, "Token role no longer matches the account");
            return Err(ApiError::Forbidden);
        }
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(subject = %claims.sub, "Admin token for an unknown account");
            return Err(ApiError::Forbidden);
        }
        Err(e) => return Err(ApiError::InternalError(e.to_string())),
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
