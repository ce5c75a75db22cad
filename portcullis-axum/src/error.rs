use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use portcullis::{AuthError, Error, RejectReason, Rejection};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A login attempt the account guard turned down
    #[error("Login rejected: {}", .0.reason)]
    Rejected(Rejection),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account already exists")]
    AccountAlreadyExists,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_not_found() {
            return ApiError::AccountNotFound;
        }

        match err {
            Error::Auth(AuthError::AccountAlreadyExists) => ApiError::AccountAlreadyExists,
            Error::Validation(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

fn rejection_status(reason: RejectReason) -> StatusCode {
    match reason {
        RejectReason::UnknownIdentity | RejectReason::BadPassword => StatusCode::UNAUTHORIZED,
        RejectReason::Blocked => StatusCode::FORBIDDEN,
        RejectReason::Locked => StatusCode::LOCKED,
        RejectReason::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Rejected(rejection) => {
                (rejection_status(rejection.reason), rejection.public_message())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::AccountNotFound => (StatusCode::NOT_FOUND, "Account not found".to_string()),
            ApiError::AccountAlreadyExists => {
                (StatusCode::CONFLICT, "Account already exists".to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        let mut response = (status, body).into_response();

        if let ApiError::Rejected(rejection) = &self {
            if let Some(seconds) = rejection.retry_after_seconds() {
                if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
