//! API Gateway
//!
//! Single entry point in front of the domain services:
//! - `domain/` - Service table, health model, caller identity, ports
//! - `application/` - Access guard, proxy dispatch, health monitor, config
//! - `infra/` - reqwest upstream and health probe
//! - `presentation/` - Gateway endpoints, rate limiting, router
//!
//! Access tokens are verified here with the auth service's secret and
//! checked against the shared revocation registry. The caller's identity
//! travels downstream as `X-User-Id`, `X-User-Email` and `X-User-Role`.
//! A service that cannot be reached yields a 503 naming it; the rest of the
//! gateway keeps serving.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


pub use application::{GatewayConfig, HealthMonitor};
pub use error::{GatewayError, GatewayResult};
pub use infra::HttpUpstream;
pub use presentation::{GatewayState, gateway_router, gateway_router_generic};
