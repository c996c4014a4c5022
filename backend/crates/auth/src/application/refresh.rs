//! Refresh Use Case
//!
//! Trades a refresh token for a new access + refresh pair.
//!
//! By default the presented refresh token stays valid until it expires, so
//! several refresh tokens for one user can be live at once. With
//! `AuthConfig::rotate_refresh_tokens` the presented token is revoked once
//! the new pair has been minted.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::UserId;
use platform::token::{TokenKind, TokenRejection};

use crate::application::services::{AuthServices, TokenPair};
use crate::domain::repository::{RevocationRegistry, UserRepository};
use crate::error::{AuthError, AuthResult};

/// Refresh input
pub struct RefreshInput {
    pub refresh_token: Option<String>,
}

/// Refresh use case
pub struct RefreshUseCase<U, V>
where
    U: UserRepository,
    V: RevocationRegistry,
{
    users: Arc<U>,
    revocations: Arc<V>,
    services: AuthServices,
}

impl<U, V> RefreshUseCase<U, V>
where
    U: UserRepository + Sync,
    V: RevocationRegistry + Sync,
{
    pub fn new(users: Arc<U>, revocations: Arc<V>, services: AuthServices) -> Self {
        Self {
            users,
            revocations,
            services,
        }
    }

    pub async fn execute(&self, input: RefreshInput) -> AuthResult<TokenPair> {
        let token = input
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::RefreshTokenMissing)?;

        let verified = self
            .services
            .codec
            .verify_kind(&token, TokenKind::Refresh)
            .map_err(|rejection| match rejection {
                TokenRejection::TypeMismatch { .. } => AuthError::TokenTypeMismatch,
                TokenRejection::Expired | TokenRejection::Invalid => {
                    AuthError::RefreshTokenInvalid
                }
            })?;

        if self.revocations.is_revoked(&token).await? {
            return Err(AuthError::TokenRevoked);
        }

        let user_id: UserId = verified
            .subject
            .id
            .parse()
            .map_err(|_| AuthError::RefreshTokenInvalid)?;

        // Reload so the new tokens carry current email and roles.
        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        let roles = self.users.roles_for(&user.id).await?;

        let tokens = self.services.issue_token_pair(&user, &roles)?;

        if self.services.config.rotate_refresh_tokens {
            if let Ok(remaining) = (verified.expires_at - Utc::now()).to_std() {
                self.revocations.revoke(&token, remaining).await?;
            }
        }

        tracing::debug!(user_id = %user.id, "Tokens refreshed");

        Ok(tokens)
    }
}
