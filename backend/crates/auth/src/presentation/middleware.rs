//! Auth Middleware
//!
//! Bearer-token authentication for protected routes and per-route rate
//! limiting for the credential endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{TrustedProxies, extract_bearer_token};
use platform::rate_limit::{RateLimitConfig, RateLimitStore};

use crate::application::AuthenticateUseCase;
use crate::domain::AuthStore;
use crate::error::AuthError;
use crate::presentation::extract::client_info;
use crate::presentation::handlers::AuthAppState;

/// Reject requests without a live access token. On success the caller's
/// [`AuthenticatedUser`](crate::application::AuthenticatedUser) is stored in
/// the request extensions.
pub async fn require_access_token<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: AuthStore,
{
    let token = extract_bearer_token(req.headers()).map(str::to_string);

    let user = AuthenticateUseCase::new(state.repo.clone(), state.services.clone())
        .execute(token.as_deref())
        .await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Rate limiter state for one route
pub struct RateLimitState<L> {
    pub store: Arc<L>,
    pub config: RateLimitConfig,
    /// Key prefix, usually the route path.
    pub scope: &'static str,
    pub trusted: TrustedProxies,
}

impl<L> Clone for RateLimitState<L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config,
            scope: self.scope,
            trusted: self.trusted.clone(),
        }
    }
}

/// Fixed-window limit keyed by `scope:client_ip`. Fails open when the
/// counter store is unavailable.
pub async fn rate_limit<L>(
    State(state): State<RateLimitState<L>>,
    req: Request,
    next: Next,
) -> Response
where
    L: RateLimitStore + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let client = client_info(&parts, &state.trusted);
    let key = format!("{}:{}", state.scope, client.ip_or_unknown());
    let req = Request::from_parts(parts, body);

    match state.store.check_and_increment(&key, &state.config).await {
        Ok(result) if result.allowed => next.run(req).await,
        Ok(result) => {
            tracing::warn!(key = %key, limit = result.limit, "Rate limit exceeded");
            let mut response = AuthError::RateLimited.into_response();
            let retry_after = result.reset_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        Err(e) => {
            tracing::error!(error = %e, key = %key, "Rate limit store unavailable, allowing request");
            next.run(req).await
        }
    }
}
