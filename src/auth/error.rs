use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Registration not found. Please register first.")]
    NotFound,

    #[error("No OTP found. Please request a new OTP.")]
    NoCodeIssued,

    #[error("OTP has expired. Please register again.")]
    Expired,

    #[error("Invalid OTP. Please try again.")]
    InvalidCode,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    AuthFailed,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to send OTP: {0}")]
    DeliveryFailed(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::NoCodeIssued | AuthError::InvalidCode | AuthError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Expired => StatusCode::GONE,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::AuthFailed | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
