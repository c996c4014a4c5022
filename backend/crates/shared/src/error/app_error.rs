//! Application Error - the one error shape every HTTP response uses
//!
//! Defines [`AppError`] and [`AppResult<T>`].

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::kind::ErrorKind;

/// Generic message shown in place of internal error details.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Unified application error.
///
/// Crate-level errors are converted into this type at the presentation
/// boundary. The `message` is the human-readable text clients see; `source`
/// is kept for logs only.
///
/// ## Examples
/// ```rust
/// use kernel::error::{app_error::AppError, kind::ErrorKind};
///
/// let err = AppError::new(ErrorKind::NotFound, "User not found");
/// assert_eq!(err.status_code(), 404);
/// ```
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    #[inline]
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[inline]
    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[inline]
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    #[inline]
    pub fn service_unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Attach the underlying cause. It is logged, never rendered.
    ///
    /// ```rust
    /// use kernel::error::app_error::AppError;
    ///
    /// let io = std::io::Error::other("disk on fire");
    /// let err = AppError::internal("Failed to read file").with_source(io);
    /// assert!(std::error::Error::source(&err).is_some());
    /// ```
    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Full message, including details that may be internal.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message safe to put on the wire.
    pub fn public_message(&self) -> &str {
        if self.kind.exposes_message() {
            &self.message
        } else {
            INTERNAL_ERROR_MESSAGE
        }
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.kind.is_server_error()
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder.field("kind", &self.kind);
        builder.field("message", &self.message);
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convenience_constructors_pick_the_right_status() {
        assert_eq!(AppError::bad_request("x").status_code(), 400);
        assert_eq!(AppError::unauthorized("x").status_code(), 401);
        assert_eq!(AppError::not_found("x").status_code(), 404);
        assert_eq!(AppError::internal("x").status_code(), 500);
        assert_eq!(AppError::service_unavailable("x").status_code(), 503);
    }

    #[test]
    fn internal_messages_are_masked() {
        let err = AppError::internal("connection refused to 10.0.0.3:5432");
        assert_eq!(err.message(), "connection refused to 10.0.0.3:5432");
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn unavailable_messages_are_exposed() {
        let err = AppError::service_unavailable("Service education is currently unavailable");
        assert_eq!(
            err.public_message(),
            "Service education is currently unavailable"
        );
    }

    #[test]
    fn display_includes_kind() {
        let err = AppError::not_found("User not found");
        assert_eq!(err.to_string(), "[Not Found] User not found");
    }
}
