//! Service health model and aggregation rules

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Classify a probe's HTTP status.
    pub fn from_probe_status(status: u16) -> Self {
        match status {
            200 => HealthStatus::Healthy,
            s if s < 500 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }

    /// Status code for health endpoints: 200, 207 (Multi-Status) or 503.
    pub const fn http_status(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 207,
            HealthStatus::Unhealthy => 503,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateHealth {
    pub status: HealthStatus,
    pub services: Vec<ServiceHealth>,
    pub timestamp: DateTime<Utc>,
    pub gateway_version: &'static str,
}

/// Worst status wins. No data yet counts as degraded.
pub fn aggregate_status(services: &[ServiceHealth]) -> HealthStatus {
    if services.is_empty() {
        return HealthStatus::Degraded;
    }
    if services.iter().any(|s| s.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if services.iter().any(|s| s.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
