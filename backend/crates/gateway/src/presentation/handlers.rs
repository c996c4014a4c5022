//! Gateway Handlers

use std::sync::Arc;

use auth::domain::RevocationRegistry;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::application::{
    AccessGuard, GATEWAY_VERSION, GatewayConfig, HealthMonitor, ProxyService,
};
use crate::domain::health::HealthStatus;
use crate::domain::ports::{HealthProbe, Upstream};
use crate::error::GatewayError;

/// Shared state for gateway handlers
pub struct GatewayState<V, U, P> {
    pub proxy: Arc<ProxyService<V, U>>,
    pub monitor: Arc<HealthMonitor<P>>,
}

impl<V, U, P> Clone for GatewayState<V, U, P> {
    fn clone(&self) -> Self {
        Self {
            proxy: self.proxy.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<V, U, P> GatewayState<V, U, P>
where
    V: RevocationRegistry + Sync,
    U: Upstream + Sync,
    P: HealthProbe + Sync + 'static,
{
    /// Wire the proxy and health monitor from one configuration.
    pub fn new(config: &GatewayConfig, revocations: Arc<V>, upstream: Arc<U>, probe: Arc<P>) -> Self {
        let guard = AccessGuard::new(config.token_codec(), revocations);
        Self {
            proxy: Arc::new(ProxyService::new(config.registry(), guard, upstream)),
            monitor: Arc::new(HealthMonitor::new(
                config.registry(),
                probe,
                config.health_cache_ttl,
            )),
        }
    }
}

#[derive(Serialize)]
struct ServiceInfo {
    name: String,
    path: String,
}

/// Gateway liveness; never touches downstream services.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "api-gateway",
        "version": GATEWAY_VERSION,
        "timestamp": Utc::now(),
    }))
}

pub async fn aggregate_health<V, U, P>(State(state): State<GatewayState<V, U, P>>) -> Response
where
    P: HealthProbe + Sync + 'static,
{
    let aggregate = state.monitor.aggregate().await;
    (status_code(aggregate.status), Json(aggregate)).into_response()
}

pub async fn service_health<V, U, P>(
    State(state): State<GatewayState<V, U, P>>,
    Path(service): Path<String>,
) -> Result<Response, GatewayError>
where
    P: HealthProbe + Sync + 'static,
{
    let health = state
        .monitor
        .service_health(&service)
        .await
        .ok_or(GatewayError::ServiceNotFound)?;
    Ok((status_code(health.status), Json(health)).into_response())
}

pub async fn info<V, U, P>(State(state): State<GatewayState<V, U, P>>) -> impl IntoResponse
where
    V: RevocationRegistry + Sync,
    U: Upstream + Sync,
{
    let registry = state.proxy.registry();
    let services: Vec<ServiceInfo> = registry
        .routes()
        .iter()
        .map(|route| ServiceInfo {
            name: route.name.clone(),
            path: registry.mount_path(route),
        })
        .collect();

    Json(json!({
        "name": "Nexus API Gateway",
        "version": GATEWAY_VERSION,
        "description": "API gateway for the platform's domain services",
        "services": services,
        "timestamp": Utc::now(),
    }))
}

/// Fallback: everything not served by the gateway itself.
pub async fn proxy<V, U, P>(
    State(state): State<GatewayState<V, U, P>>,
    request: Request,
) -> Result<Response, GatewayError>
where
    V: RevocationRegistry + Sync,
    U: Upstream + Sync,
{
    state.proxy.dispatch(request).await
}

fn status_code(status: HealthStatus) -> StatusCode {
    StatusCode::from_u16(status.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
