//! Logout Use Case
//!
//! Blacklists the access token for the rest of its lifetime and drops the
//! cached session. Idempotent: succeeds when there is nothing to revoke.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::UserId;
use platform::client::ClientInfo;
use serde_json::json;

use crate::application::services::AuthServices;
use crate::domain::entity::{
    audit::{AuditEntry, AuditEventType},
    event::DomainEvent,
};
use crate::domain::repository::{RevocationRegistry, SessionCache};
use crate::error::AuthResult;

/// Logout input
pub struct LogoutInput {
    pub access_token: Option<String>,
    /// Set when the caller authenticated with a token that was still live.
    pub user_id: Option<UserId>,
    pub client: ClientInfo,
}

/// Logout use case
pub struct LogoutUseCase<V, S>
where
    V: RevocationRegistry,
    S: SessionCache,
{
    revocations: Arc<V>,
    sessions: Arc<S>,
    services: AuthServices,
}

impl<V, S> LogoutUseCase<V, S>
where
    V: RevocationRegistry + Sync,
    S: SessionCache + Sync,
{
    pub fn new(revocations: Arc<V>, sessions: Arc<S>, services: AuthServices) -> Self {
        Self {
            revocations,
            sessions,
            services,
        }
    }

    /// A failure to write the blacklist entry is returned; everything after
    /// it is best-effort.
    pub async fn execute(&self, input: LogoutInput) -> AuthResult<()> {
        if let Some(token) = input.access_token.as_deref() {
            // Expiry only; the signature was checked (or deliberately not) upstream.
            match self.services.codec.decode_unverified(token) {
                Ok(claims) => match claims.remaining_ttl(Utc::now()) {
                    Some(ttl) => self.revocations.revoke(token, ttl).await?,
                    None => tracing::debug!("Token already expired, nothing to revoke"),
                },
                Err(_) => tracing::debug!("Undecodable token on logout, nothing to revoke"),
            }
        }

        if let Some(user_id) = input.user_id {
            if let Err(e) = self.sessions.delete_session(&user_id).await {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to delete cached session");
            }

            tracing::info!(user_id = %user_id, "User logged out");

            let dispatcher = &self.services.dispatcher;
            dispatcher.event(DomainEvent::UserLoggedOut { user_id });
            dispatcher.audit(AuditEntry::new(
                Some(user_id),
                AuditEventType::UserLoggedOut,
                json!({}),
                &input.client,
            ));
        }

        Ok(())
    }
}
