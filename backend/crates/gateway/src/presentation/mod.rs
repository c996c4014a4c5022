//! Presentation Layer
//!
//! Gateway-owned endpoints (`/health*`, `/info`) and the proxy fallback.

pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::GatewayState;
pub use middleware::ClassRateLimit;
pub use router::{gateway_router, gateway_router_generic};
