//! Gateway Router

use std::sync::Arc;

use auth::domain::RevocationRegistry;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{Router, middleware, routing::get};
use platform::rate_limit::{MemoryRateLimitStore, RateLimitStore};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::application::GatewayConfig;
use crate::domain::ports::{HealthProbe, Upstream};
use crate::presentation::handlers::{self, GatewayState};
use crate::presentation::middleware::{ClassRateLimit, make_span, rate_limit_by_class};

/// Gateway router with a process-local rate limiter.
pub fn gateway_router<V, U, P>(config: &GatewayConfig, state: GatewayState<V, U, P>) -> Router
where
    V: RevocationRegistry + Sync + 'static,
    U: Upstream + Sync + 'static,
    P: HealthProbe + Sync + 'static,
{
    gateway_router_generic(
        state,
        ClassRateLimit::new(Arc::new(MemoryRateLimitStore::new()), config),
    )
}

/// Gateway router for any revocation, upstream, probe and limiter backend
pub fn gateway_router_generic<V, U, P, L>(
    state: GatewayState<V, U, P>,
    limiter: ClassRateLimit<L>,
) -> Router
where
    V: RevocationRegistry + Sync + 'static,
    U: Upstream + Sync + 'static,
    P: HealthProbe + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/aggregate", get(handlers::aggregate_health::<V, U, P>))
        .route("/health/{service}", get(handlers::service_health::<V, U, P>))
        .route("/info", get(handlers::info::<V, U, P>))
        .fallback(handlers::proxy::<V, U, P>)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_by_class::<L>,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Uuid::new_v4().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors),
        )
}
