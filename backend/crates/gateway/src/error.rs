//! Gateway Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Access token required")]
    TokenMissing,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    /// Bad signature, malformed token or a refresh token in the access slot.
    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Route not found")]
    RouteNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Too many requests from this IP, please try again later")]
    RateLimited,

    #[error("Too many authentication attempts, please try again later")]
    AuthRateLimited,

    #[error("Request body too large")]
    PayloadTooLarge,

    /// Transport failure or timeout talking to a downstream service.
    #[error("Service {service} is currently unavailable")]
    ServiceUnavailable {
        service: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn unavailable(service: impl Into<String>, source: reqwest::Error) -> Self {
        GatewayError::ServiceUnavailable {
            service: service.into(),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::TokenMissing | GatewayError::TokenExpired | GatewayError::TokenRevoked => {
                ErrorKind::Unauthorized
            }
            GatewayError::TokenInvalid => ErrorKind::Forbidden,
            GatewayError::RouteNotFound | GatewayError::ServiceNotFound => ErrorKind::NotFound,
            GatewayError::RateLimited | GatewayError::AuthRateLimited => {
                ErrorKind::TooManyRequests
            }
            GatewayError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            GatewayError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            GatewayError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log(&self) {
        match self {
            GatewayError::ServiceUnavailable { service, source } => match source {
                Some(e) => tracing::error!(service = %service, error = %e, "Proxy error"),
                None => tracing::error!(service = %service, "Proxy error"),
            },
            GatewayError::Internal(msg) => tracing::error!(message = %msg, "Gateway internal error"),
            GatewayError::TokenInvalid | GatewayError::TokenRevoked => {
                tracing::warn!(error = %self, "Rejected token");
            }
            GatewayError::RateLimited | GatewayError::AuthRateLimited => {
                tracing::warn!(error = %self, "Gateway rate limit exceeded");
            }
            _ => tracing::debug!(error = %self, "Gateway error"),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
