//! Access token checks at the edge
//!
//! Verifies bearer tokens with the auth service's secret and consults the
//! shared revocation registry, so a logged-out token is refused here before
//! any downstream service sees it.

use std::sync::Arc;

use auth::domain::RevocationRegistry;
use axum::http::HeaderMap;
use platform::client::extract_bearer_token;
use platform::token::{TokenCodec, TokenKind, TokenRejection};

use crate::domain::identity::CallerIdentity;
use crate::error::{GatewayError, GatewayResult};

pub struct AccessGuard<V> {
    codec: TokenCodec,
    revocations: Arc<V>,
}

impl<V> AccessGuard<V>
where
    V: RevocationRegistry + Sync,
{
    pub fn new(codec: TokenCodec, revocations: Arc<V>) -> Self {
        Self { codec, revocations }
    }

    /// Require a live access token.
    pub async fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<CallerIdentity> {
        let token = extract_bearer_token(headers).ok_or(GatewayError::TokenMissing)?;

        let verified = self
            .codec
            .verify_kind(token, TokenKind::Access)
            .map_err(|rejection| match rejection {
                TokenRejection::Expired => GatewayError::TokenExpired,
                TokenRejection::Invalid | TokenRejection::TypeMismatch { .. } => {
                    GatewayError::TokenInvalid
                }
            })?;

        let revoked = self.revocations.is_revoked(token).await.map_err(|e| {
            GatewayError::Internal(format!("revocation lookup failed: {e}"))
        })?;
        if revoked {
            return Err(GatewayError::TokenRevoked);
        }

        Ok(CallerIdentity {
            user_id: verified.subject.id,
            email: verified.subject.email,
            role: verified.subject.role,
        })
    }

    /// Identity when a usable token is present. Never fails the request;
    /// the downstream service makes its own decision.
    pub async fn identify(&self, headers: &HeaderMap) -> Option<CallerIdentity> {
        extract_bearer_token(headers)?;
        match self.authenticate(headers).await {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unusable token on self-authenticated route");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use auth::MemoryAuthStore;
    use axum::http::{HeaderValue, header};
    use platform::token::TokenSubject;

    const SECRET: &[u8] = b"gateway-test-secret-gateway-test-secret";

    fn guard() -> (AccessGuard<MemoryAuthStore>, MemoryAuthStore) {
        let store = MemoryAuthStore::new();
        (
            AccessGuard::new(TokenCodec::new(SECRET), Arc::new(store.clone())),
            store,
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn issue(kind: TokenKind, ttl: Duration) -> String {
        let subject = TokenSubject::new("user-1")
            .with_email("a@example.com")
            .with_role("admin");
        TokenCodec::new(SECRET).issue(&subject, kind, ttl).unwrap().token
    }

    #[tokio::test]
    async fn accepts_access_token() {
        let (guard, _) = guard();
        let identity = guard
            .authenticate(&bearer(&issue(TokenKind::Access, Duration::from_secs(60))))
            .await
            .unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn rejection_kinds() {
        let (guard, store) = guard();

        assert!(matches!(
            guard.authenticate(&HeaderMap::new()).await,
            Err(GatewayError::TokenMissing)
        ));
        assert!(matches!(
            guard.authenticate(&bearer("garbage")).await,
            Err(GatewayError::TokenInvalid)
        ));
        assert!(matches!(
            guard
                .authenticate(&bearer(&issue(TokenKind::Refresh, Duration::from_secs(60))))
                .await,
            Err(GatewayError::TokenInvalid)
        ));

        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        let expired = TokenCodec::new(SECRET)
            .issue_at(
                &TokenSubject::new("user-1"),
                TokenKind::Access,
                past,
                Duration::from_secs(60),
            )
            .unwrap()
            .token;
        assert!(matches!(
            guard.authenticate(&bearer(&expired)).await,
            Err(GatewayError::TokenExpired)
        ));

        let revoked = issue(TokenKind::Access, Duration::from_secs(60));
        store.revoke(&revoked, Duration::from_secs(60)).await.unwrap();
        assert!(matches!(
            guard.authenticate(&bearer(&revoked)).await,
            Err(GatewayError::TokenRevoked)
        ));
        assert!(guard.identify(&bearer(&revoked)).await.is_none());
    }
}
