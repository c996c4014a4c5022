//! Periodic downstream health checks
//!
//! Probes every service on an interval and caches the latest result per
//! service. Probes run concurrently; one slow service does not delay the
//! others beyond the probe timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::domain::health::{AggregateHealth, HealthStatus, ServiceHealth, aggregate_status};
use crate::domain::ports::HealthProbe;
use crate::domain::service::{ServiceRegistry, ServiceRoute};

pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct HealthMonitor<P> {
    registry: ServiceRegistry,
    probe: Arc<P>,
    cache: RwLock<HashMap<String, ServiceHealth>>,
    cache_ttl: Duration,
}

impl<P> HealthMonitor<P>
where
    P: HealthProbe + Sync + 'static,
{
    pub fn new(registry: ServiceRegistry, probe: Arc<P>, cache_ttl: Duration) -> Self {
        Self {
            registry,
            probe,
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    /// Probe one service and cache the result.
    pub async fn check(&self, route: &ServiceRoute) -> ServiceHealth {
        let health = probe_route(self.probe.as_ref(), route).await;
        self.cache
            .write()
            .await
            .insert(route.name.clone(), health.clone());
        health
    }

    /// Probe every service concurrently.
    pub async fn check_all(&self) {
        let mut probes = JoinSet::new();
        for route in self.registry.routes() {
            let probe = self.probe.clone();
            let route = route.clone();
            probes.spawn(async move { probe_route(probe.as_ref(), &route).await });
        }

        let mut results = Vec::with_capacity(self.registry.routes().len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(health) => results.push(health),
                Err(e) => tracing::error!(error = %e, "Health probe task failed"),
            }
        }

        let mut cache = self.cache.write().await;
        for health in results {
            cache.insert(health.name.clone(), health);
        }
    }

    /// Cached rollup. Services never probed are left out.
    pub async fn aggregate(&self) -> AggregateHealth {
        let mut services: Vec<ServiceHealth> = self.cache.read().await.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));

        AggregateHealth {
            status: aggregate_status(&services),
            services,
            timestamp: Utc::now(),
            gateway_version: GATEWAY_VERSION,
        }
    }

    /// `None` for unknown services. Stale or missing entries are re-probed.
    pub async fn service_health(&self, name: &str) -> Option<ServiceHealth> {
        let route = self.registry.get(name)?;

        if let Some(cached) = self.cache.read().await.get(name) {
            let age = (Utc::now() - cached.last_checked).to_std().unwrap_or_default();
            if age < self.cache_ttl {
                return Some(cached.clone());
            }
        }

        Some(self.check(route).await)
    }

    /// Check immediately, then every `interval` until `shutdown` flips to true.
    pub fn spawn(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_ms = interval.as_millis() as u64, "Health check monitoring started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.check_all().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Health check monitoring stopped");
        })
    }
}

async fn probe_route<P>(probe: &P, route: &ServiceRoute) -> ServiceHealth
where
    P: HealthProbe + Sync,
{
    let outcome = probe.probe(route).await;
    let status = match outcome.status {
        Some(code) => HealthStatus::from_probe_status(code),
        None => HealthStatus::Unhealthy,
    };

    if status == HealthStatus::Unhealthy {
        tracing::warn!(
            service = %route.name,
            error = outcome.error.as_deref().unwrap_or("bad status"),
            "Health check failed"
        );
    }

    ServiceHealth {
        name: route.name.clone(),
        status,
        response_time_ms: outcome.elapsed.as_millis() as u64,
        last_checked: Utc::now(),
        details: outcome.details,
        error: outcome.error,
    }
}
