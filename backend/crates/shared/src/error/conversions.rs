//! Error conversions - `From` implementations and the HTTP rendering
//!
//! Every error response body has the shape
//! `{ "success": false, "error": "<human readable message>" }`.

use super::app_error::AppError;
#[cfg(feature = "sqlx")]
use super::kind::ErrorKind;

/// JSON body used for every error response.
pub fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": message,
    })
}

// ============================================================================
// serde_json conversions
// ============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            AppError::bad_request("Malformed JSON body").with_source(err)
        } else {
            AppError::internal("JSON serialization error").with_source(err)
        }
    }
}

// ============================================================================
// SQLx conversions (feature-gated)
// ============================================================================

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ErrorKind::ServiceUnavailable,
            // https://www.postgresql.org/docs/current/errcodes-appendix.html
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => ErrorKind::Conflict,
                Some("53000" | "53100" | "53200" | "53300") => ErrorKind::ServiceUnavailable,
                Some("57P01" | "57P02" | "57P03") => ErrorKind::ServiceUnavailable,
                _ => ErrorKind::InternalServerError,
            },
            _ => ErrorKind::InternalServerError,
        };
        let message = match kind {
            ErrorKind::Conflict => "Duplicate key value",
            ErrorKind::ServiceUnavailable => "Database unavailable",
            _ => "Database error",
        };
        AppError::new(kind, message).with_source(err)
    }
}

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(error_body(self.public_message()))).into_response()
    }
}
