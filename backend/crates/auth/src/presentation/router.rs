//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::rate_limit::{MemoryRateLimitStore, RateLimitStore};

use crate::application::AuthServices;
use crate::domain::AuthStore;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{RateLimitState, rate_limit, require_access_token};

/// Create the Auth router with the PostgreSQL repository and a
/// process-local rate limiter.
pub fn auth_router(repo: PgAuthRepository, services: AuthServices) -> Router {
    auth_router_generic(repo, services, Arc::new(MemoryRateLimitStore::new()))
}

/// Create a generic Auth router for any storage and rate-limit backend
pub fn auth_router_generic<R, L>(repo: R, services: AuthServices, limiter: Arc<L>) -> Router
where
    R: AuthStore,
    L: RateLimitStore + Sync + 'static,
{
    let register_limit = RateLimitState {
        store: limiter.clone(),
        config: services.config.register_rate_limit,
        scope: "/auth/register",
        trusted: services.config.trusted_proxies.clone(),
    };
    let login_limit = RateLimitState {
        store: limiter,
        config: services.config.login_rate_limit,
        scope: "/auth/login",
        trusted: services.config.trusted_proxies.clone(),
    };

    let state = AuthAppState {
        repo: Arc::new(repo),
        services,
    };

    Router::new()
        .route(
            "/register",
            post(handlers::register::<R>)
                .layer(middleware::from_fn_with_state(register_limit, rate_limit::<L>)),
        )
        .route(
            "/login",
            post(handlers::login::<R>)
                .layer(middleware::from_fn_with_state(login_limit, rate_limit::<L>)),
        )
        .route("/refresh", post(handlers::refresh::<R>))
        .route("/logout", post(handlers::logout::<R>))
        .route(
            "/profile",
            get(handlers::profile::<R>).layer(middleware::from_fn_with_state(
                state.clone(),
                require_access_token::<R>,
            )),
        )
        .with_state(state)
}

/// Liveness endpoint for the auth service
pub fn health_router() -> Router {
    Router::new().route("/health", get(handlers::health))
}
