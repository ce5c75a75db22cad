use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use portcullis::{LoginOutcome, Portcullis, RepositoryProvider};

use crate::{
    error::{ApiError, Result},
    extractors::AdminUser,
    middleware::{AuthState, require_admin},
    types::*,
};

pub fn create_router<R>(portcullis: Arc<Portcullis<R>>) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = AuthState { portcullis };

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler));

    let admin_routes = Router::new()
        .route("/admin/accounts/{identity}", get(account_status_handler))
        .route("/admin/accounts/{identity}/block", put(set_blocked_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin::<R>,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health_handler<R>(State(state): State<AuthState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .portcullis
        .health_check()
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn login_handler<R>(
    State(state): State<AuthState<R>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let Json(req) = payload?;

    match state.portcullis.login(&req.identity, &req.secret).await {
        LoginOutcome::Granted {
            identity,
            role,
            token,
        } => Ok(Json(LoginResponse {
            success: true,
            token: token.token,
            expires_at: token.expires_at,
            role,
            identity: identity.into_inner(),
        })),
        LoginOutcome::Denied(rejection) => Err(rejection.into()),
    }
}

async fn set_blocked_handler<R>(
    State(state): State<AuthState<R>>,
    AdminUser(admin): AdminUser,
    Path(identity): Path<String>,
    payload: std::result::Result<Json<SetBlockedRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let Json(req) = payload?;

    tracing::info!(
        admin = %admin.sub,
        identity = %identity,
        blocked = req.blocked,
        "Admin changed account block status"
    );

    state
        .portcullis
        .admin_set_blocked(&identity, req.blocked, req.reason.as_deref())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn account_status_handler<R>(
    State(state): State<AuthState<R>>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let status = state.portcullis.account_status(&identity).await?;
    Ok(Json(status))
}
