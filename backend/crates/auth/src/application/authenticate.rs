//! Authenticate Use Case
//!
//! Resolves a bearer access token into the caller's identity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::token::TokenKind;

use crate::application::services::AuthServices;
use crate::domain::repository::RevocationRegistry;
use crate::error::{AuthError, AuthResult};

/// Identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Raw bearer token, kept for logout.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a lenient check: the token verified but may already be revoked.
#[derive(Debug, Clone)]
pub enum TokenCheck {
    Live(AuthenticatedUser),
    Revoked,
}

pub struct AuthenticateUseCase<V>
where
    V: RevocationRegistry,
{
    revocations: Arc<V>,
    services: AuthServices,
}

impl<V> AuthenticateUseCase<V>
where
    V: RevocationRegistry + Sync,
{
    pub fn new(revocations: Arc<V>, services: AuthServices) -> Self {
        Self {
            revocations,
            services,
        }
    }

    /// Strict check used by protected routes.
    pub async fn execute(&self, token: Option<&str>) -> AuthResult<AuthenticatedUser> {
        match self.check(token).await? {
            TokenCheck::Live(user) => Ok(user),
            TokenCheck::Revoked => Err(AuthError::TokenRevoked),
        }
    }

    /// Signature, expiry and type are enforced; revocation is reported
    /// instead of rejected so logout can stay idempotent.
    pub async fn check(&self, token: Option<&str>) -> AuthResult<TokenCheck> {
        let token = token.ok_or(AuthError::TokenMissing)?;
        let verified = self.services.codec.verify_kind(token, TokenKind::Access)?;

        if self.revocations.is_revoked(token).await? {
            return Ok(TokenCheck::Revoked);
        }

        let user_id: UserId = verified
            .subject
            .id
            .parse()
            .map_err(|_| AuthError::TokenInvalid)?;

        Ok(TokenCheck::Live(AuthenticatedUser {
            user_id,
            email: verified.subject.email,
            role: verified.subject.role,
            token: token.to_string(),
            expires_at: verified.expires_at,
        }))
    }
}
