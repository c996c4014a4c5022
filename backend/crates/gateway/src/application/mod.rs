//! Application Layer

pub mod access_guard;
pub mod config;
pub mod health_monitor;
pub mod proxy;

pub use access_guard::AccessGuard;
pub use config::GatewayConfig;
pub use health_monitor::{GATEWAY_VERSION, HealthMonitor};
pub use proxy::{ProxyService, X_GATEWAY, X_REQUEST_ID};
