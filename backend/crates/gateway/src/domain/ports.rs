//! Ports to downstream services

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::domain::service::ServiceRoute;
use crate::error::GatewayResult;

/// Result of one health probe. `status` is `None` on transport failure.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: Option<u16>,
    pub details: Option<serde_json::Value>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

#[trait_variant::make(HealthProbe: Send)]
pub trait LocalHealthProbe {
    async fn probe(&self, route: &ServiceRoute) -> ProbeOutcome;
}

/// Sends a prepared request to a service and relays its response.
#[trait_variant::make(Upstream: Send)]
pub trait LocalUpstream {
    /// Fails with `GatewayError::ServiceUnavailable` on transport errors and
    /// timeouts. Downstream error statuses are relayed, not converted.
    async fn forward(
        &self,
        route: &ServiceRoute,
        request: Request<Body>,
    ) -> GatewayResult<Response<Body>>;
}
