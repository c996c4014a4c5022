//! Domain Layer
//!
//! Service table, health model, caller identity and the ports to the
//! downstream network.

pub mod health;
pub mod identity;
pub mod ports;
pub mod service;

pub use health::{AggregateHealth, HealthStatus, ServiceHealth, aggregate_status};
pub use identity::CallerIdentity;
pub use ports::{HealthProbe, ProbeOutcome, Upstream};
pub use service::{RouteClass, ServiceRegistry, ServiceRoute};
