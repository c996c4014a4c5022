//! Shared application services
//!
//! Constructed once at process start and cloned into every use case.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::token::{TokenCodec, TokenKind, TokenSubject};

use crate::application::config::AuthConfig;
use crate::application::dispatcher::SideEffectDispatcher;
use crate::domain::User;
use crate::domain::services::PasswordHasher;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthResult;

#[derive(Clone)]
pub struct AuthServices {
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub dispatcher: SideEffectDispatcher,
}

/// Access + refresh token pair bound to one user.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl AuthServices {
    pub fn new(
        config: AuthConfig,
        hasher: Arc<dyn PasswordHasher>,
        dispatcher: SideEffectDispatcher,
    ) -> Self {
        let codec = config.token_codec();
        Self {
            config: Arc::new(config),
            codec: Arc::new(codec),
            hasher,
            dispatcher,
        }
    }

    /// Mint a fresh pair carrying the user's email and primary role.
    pub fn issue_token_pair(&self, user: &User, roles: &[UserRole]) -> AuthResult<TokenPair> {
        let subject = TokenSubject::new(user.id.to_string())
            .with_email(user.email.as_str())
            .with_role(UserRole::primary(roles).code());

        let access = self
            .codec
            .issue(&subject, TokenKind::Access, self.config.access_token_ttl)?;
        let refresh = self
            .codec
            .issue(&subject, TokenKind::Refresh, self.config.refresh_token_ttl)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }
}
