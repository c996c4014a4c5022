//! Gateway Middleware

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{TrustedProxies, extract_client_ip};
use platform::rate_limit::{RateLimitConfig, RateLimitStore};
use tracing::{Span, debug_span};

use crate::application::GatewayConfig;
use crate::domain::service::{RouteClass, ServiceRegistry};
use crate::error::GatewayError;

/// Limiter state shared by every proxied route
pub struct ClassRateLimit<L> {
    pub store: Arc<L>,
    pub registry: Arc<ServiceRegistry>,
    pub standard: RateLimitConfig,
    pub auth: RateLimitConfig,
    pub trusted: TrustedProxies,
}

impl<L> Clone for ClassRateLimit<L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            standard: self.standard,
            auth: self.auth,
            trusted: self.trusted.clone(),
        }
    }
}

impl<L> ClassRateLimit<L> {
    pub fn new(store: Arc<L>, config: &GatewayConfig) -> Self {
        Self {
            store,
            registry: Arc::new(config.registry()),
            standard: config.rate_limit_for(RouteClass::Standard),
            auth: config.rate_limit_for(RouteClass::Auth),
            trusted: config.trusted_proxies.clone(),
        }
    }
}

/// Fixed-window limit keyed by `class:client_ip`. Only paths under the API
/// prefix count; gateway endpoints are never limited. Fails open when the
/// counter store is unavailable.
///
/// The client is the socket peer; `X-Forwarded-For` is only read when that
/// peer is a trusted proxy.
pub async fn rate_limit_by_class<L>(
    State(state): State<ClassRateLimit<L>>,
    req: Request,
    next: Next,
) -> Response
where
    L: RateLimitStore + Sync + 'static,
{
    let path = req.uri().path();
    let class = match state.registry.match_path(path) {
        Some(route) => route.class,
        None if path.starts_with(state.registry.prefix()) => RouteClass::Standard,
        None => return next.run(req).await,
    };
    let (config, rejection) = match class {
        RouteClass::Auth => (state.auth, GatewayError::AuthRateLimited),
        RouteClass::Standard => (state.standard, GatewayError::RateLimited),
    };

    let peer_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client = extract_client_ip(req.headers(), peer_ip, &state.trusted)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("{}:{}", class.as_str(), client);

    match state.store.check_and_increment(&key, &config).await {
        Ok(result) if result.allowed => next.run(req).await,
        Ok(result) => {
            let mut response = rejection.into_response();
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

// span
pub fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method = %request.method(), path, request_id)
}
