//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` response shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::token::{TokenIssueError, TokenRejection};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Registration with an email that already exists.
    #[error("User with this email already exists")]
    EmailTaken,

    /// Wrong email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is temporarily locked due to multiple failed login attempts")]
    AccountLocked,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("No token provided")]
    TokenMissing,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Invalid token type")]
    TokenTypeMismatch,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Refresh token is required")]
    RefreshTokenMissing,

    /// Expired or malformed refresh token; the two are not told apart.
    #[error("Invalid or expired refresh token")]
    RefreshTokenInvalid,

    #[error("User not found")]
    UserNotFound,

    /// Malformed request body or a field failing validation.
    #[error("{0}")]
    Validation(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Token issuance failed: {0}")]
    TokenIssue(#[from] TokenIssueError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            // Duplicate registration is reported as a plain validation failure.
            AuthError::EmailTaken | AuthError::Validation(_) | AuthError::RefreshTokenMissing => {
                ErrorKind::BadRequest
            }
            AuthError::InvalidCredentials
            | AuthError::TokenMissing
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::TokenTypeMismatch
            | AuthError::TokenRevoked
            | AuthError::RefreshTokenInvalid => ErrorKind::Unauthorized,
            AuthError::AccountLocked | AuthError::AccountDeactivated => ErrorKind::Forbidden,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::RateLimited => ErrorKind::TooManyRequests,
            AuthError::Database(_) | AuthError::TokenIssue(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::TokenIssue(e) => {
                tracing::error!(error = %e, "Token issuance failed");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::AccountLocked => {
                tracing::warn!("Login attempt on locked account");
            }
            AuthError::TokenRevoked => {
                tracing::warn!("Revoked token presented");
            }
            AuthError::RateLimited => {
                tracing::warn!("Auth rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<TokenRejection> for AuthError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Expired => AuthError::TokenExpired,
            TokenRejection::Invalid => AuthError::TokenInvalid,
            TokenRejection::TypeMismatch { .. } => AuthError::TokenTypeMismatch,
        }
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("background task failed: {err}"))
    }
}
