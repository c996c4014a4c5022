//! Error Kind - classification shared by every crate
//!
//! Each [`ErrorKind`] maps to exactly one HTTP status code. Crate-local error
//! enums (`AuthError`, `GatewayError`, ...) collapse onto these kinds before
//! they are rendered.

use serde::Serialize;

/// Error classification.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Unauthorized;
/// assert_eq!(kind.status_code(), 401);
/// assert_eq!(kind.as_str(), "Unauthorized");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - malformed or invalid input
    BadRequest,
    /// 401 - missing or unusable credentials
    Unauthorized,
    /// 403 - authenticated but not allowed (locked, deactivated, bad token at the gateway)
    Forbidden,
    /// 404 - resource or route does not exist
    NotFound,
    /// 409 - conflicts with current state
    Conflict,
    /// 413 - request body over the configured limit
    PayloadTooLarge,
    /// 429 - rate limit exceeded
    TooManyRequests,
    /// 500 - unexpected failure
    InternalServerError,
    /// 502 - downstream answered with garbage
    BadGateway,
    /// 503 - downstream or dependency unavailable
    ServiceUnavailable,
    /// 504 - downstream timed out
    GatewayTimeout,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    ///
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::TooManyRequests.status_code(), 429);
    /// ```
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::GatewayTimeout => 504,
        }
    }

    /// Standard reason phrase.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::PayloadTooLarge => "Payload Too Large",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::BadGateway => "Bad Gateway",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
            ErrorKind::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// 5xx kinds. These are logged at `error` level.
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    #[inline]
    pub const fn is_client_error(&self) -> bool {
        let code = self.status_code();
        code >= 400 && code < 500
    }

    /// Whether the message of an error with this kind may be shown to callers.
    ///
    /// Only `InternalServerError` is masked; gateway kinds carry the failing
    /// service name on purpose.
    #[inline]
    pub const fn exposes_message(&self) -> bool {
        !matches!(self, ErrorKind::InternalServerError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_reason_phrases() {
        let all = [
            (ErrorKind::BadRequest, 400),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::PayloadTooLarge, 413),
            (ErrorKind::TooManyRequests, 429),
            (ErrorKind::InternalServerError, 500),
            (ErrorKind::BadGateway, 502),
            (ErrorKind::ServiceUnavailable, 503),
            (ErrorKind::GatewayTimeout, 504),
        ];
        for (kind, code) in all {
            assert_eq!(kind.status_code(), code, "{kind}");
        }
    }

    #[test]
    fn server_and_client_classification() {
        assert!(ErrorKind::ServiceUnavailable.is_server_error());
        assert!(!ErrorKind::Forbidden.is_server_error());
        assert!(ErrorKind::Forbidden.is_client_error());
        assert!(!ErrorKind::InternalServerError.is_client_error());
    }

    #[test]
    fn only_internal_errors_are_masked() {
        assert!(!ErrorKind::InternalServerError.exposes_message());
        assert!(ErrorKind::ServiceUnavailable.exposes_message());
        assert!(ErrorKind::Unauthorized.exposes_message());
    }
}
