//! Signed token codec (HS256 JWT)
//!
//! Tokens carry `{sub, type, iat, exp, jti}` plus the optional `email` and
//! `role` the gateway forwards downstream. Verification is a pure function
//! of the shared secret and the clock.
//!
//! [`TokenCodec::verify`] and [`TokenCodec::decode_unverified`] are kept
//! apart on purpose: only the former may back an authorization decision.
//! The latter exists for logout, which must be able to read the expiry of
//! a token it is about to blacklist.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Claims
// ============================================================================

/// Discriminates access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity bound into a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl TokenSubject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            role: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Claims of a token whose signature and expiry were checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: TokenSubject,
    pub kind: TokenKind,
    pub token_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Claims read WITHOUT checking signature or expiry.
///
/// Never use these to authorize anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedClaims {
    pub subject_id: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

impl UnverifiedClaims {
    /// Lifetime left at `now`; `None` once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Errors
// ============================================================================

/// Why a token was rejected. Callers branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// Signature valid, past expiry.
    #[error("Token expired")]
    Expired,

    /// Bad signature, unparseable, or missing required claims.
    #[error("Invalid token")]
    Invalid,

    /// Well-formed and unexpired, but of the wrong type for this use.
    #[error("Invalid token type: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: TokenKind,
        actual: TokenKind,
    },
}

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Token lifetime out of range")]
    TtlOutOfRange,
}

// ============================================================================
// Codec
// ============================================================================

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token expiring `ttl` from now.
    pub fn issue(
        &self,
        subject: &TokenSubject,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenIssueError> {
        self.issue_at(subject, kind, Utc::now(), ttl)
    }

    /// Sign a token as if issued at `issued_at`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenIssueError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenIssueError::TtlOutOfRange)?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(TokenIssueError::TtlOutOfRange)?;

        let claims = Claims {
            sub: subject.id.clone(),
            kind,
            email: subject.email.clone(),
            role: subject.role.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenRejection> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Invalid,
            }
        })?;
        let claims = data.claims;

        Ok(VerifiedToken {
            subject: TokenSubject {
                id: claims.sub,
                email: claims.email,
                role: claims.role,
            },
            kind: claims.kind,
            token_id: claims.jti,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    /// [`verify`](Self::verify), then require the given type.
    pub fn verify_kind(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<VerifiedToken, TokenRejection> {
        let verified = self.verify(token)?;
        if verified.kind != expected {
            return Err(TokenRejection::TypeMismatch {
                expected,
                actual: verified.kind,
            });
        }
        Ok(verified)
    }

    /// Read claims without checking signature or expiry.
    pub fn decode_unverified(&self, token: &str) -> Result<UnverifiedClaims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenRejection::Invalid)?;

        Ok(UnverifiedClaims {
            subject_id: data.claims.sub,
            kind: data.claims.kind,
            expires_at: timestamp(data.claims.exp)?,
        })
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &"HS256")
            .finish_non_exhaustive()
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenRejection> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(TokenRejection::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-with-enough-entropy-0123456789";
    const HOUR: Duration = Duration::from_secs(3600);

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET)
    }

    fn alice() -> TokenSubject {
        TokenSubject::new("0b7c7c1e-3f7a-4d59-9d3b-2f4f8c1d2e10")
            .with_email("alice@example.com")
            .with_role("user")
    }

    #[test]
    fn issue_then_verify_preserves_subject() {
        let codec = codec();
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let issued = codec.issue(&alice(), kind, HOUR).unwrap();
            let verified = codec.verify(&issued.token).unwrap();

            assert_eq!(verified.subject, alice());
            assert_eq!(verified.kind, kind);
            assert_eq!(verified.expires_at.timestamp(), issued.expires_at.timestamp());
        }
    }

    #[test]
    fn every_token_is_unique() {
        let codec = codec();
        let a = codec.issue(&alice(), TokenKind::Access, HOUR).unwrap();
        let b = codec.issue(&alice(), TokenKind::Access, HOUR).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn type_confusion_is_its_own_rejection() {
        let codec = codec();
        let refresh = codec.issue(&alice(), TokenKind::Refresh, HOUR).unwrap();

        assert_eq!(
            codec.verify_kind(&refresh.token, TokenKind::Access),
            Err(TokenRejection::TypeMismatch {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh,
            })
        );
        assert!(codec.verify_kind(&refresh.token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_is_distinct_from_invalid() {
        let codec = codec();
        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
        let stale = codec
            .issue_at(&alice(), TokenKind::Access, two_hours_ago, HOUR)
            .unwrap();

        assert_eq!(codec.verify(&stale.token), Err(TokenRejection::Expired));
        assert_eq!(codec.verify("not.a.jwt"), Err(TokenRejection::Invalid));
        assert_eq!(codec.verify(""), Err(TokenRejection::Invalid));
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let issued = TokenCodec::new(b"some-other-secret")
            .issue(&alice(), TokenKind::Access, HOUR)
            .unwrap();
        assert_eq!(codec().verify(&issued.token), Err(TokenRejection::Invalid));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let codec = codec();
        let other = codec
            .issue(&TokenSubject::new("someone-else"), TokenKind::Access, HOUR)
            .unwrap();
        let other_payload = other.token.split('.').nth(1).unwrap().to_string();
        let issued = codec.issue(&alice(), TokenKind::Access, HOUR).unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[1] = &other_payload;

        assert_eq!(codec.verify(&parts.join(".")), Err(TokenRejection::Invalid));
    }

    #[test]
    fn decode_unverified_reads_expired_and_foreign_tokens() {
        let codec = codec();
        let stale = codec
            .issue_at(
                &alice(),
                TokenKind::Access,
                Utc::now() - chrono::Duration::hours(2),
                HOUR,
            )
            .unwrap();
        let claims = codec.decode_unverified(&stale.token).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.remaining_ttl(Utc::now()), None);

        let foreign = TokenCodec::new(b"other")
            .issue(&alice(), TokenKind::Refresh, HOUR)
            .unwrap();
        let claims = codec.decode_unverified(&foreign.token).unwrap();
        assert_eq!(claims.subject_id, alice().id);
        let ttl = claims.remaining_ttl(Utc::now()).unwrap();
        assert!(ttl <= HOUR && ttl > Duration::from_secs(3500));

        assert_eq!(codec.decode_unverified("garbage"), Err(TokenRejection::Invalid));
    }

    #[test]
    fn debug_does_not_leak_the_secret() {
        let debug = format!("{:?}", codec());
        assert!(!debug.contains("test-secret"));
    }
}
