//! Downstream service table
//!
//! Each service owns one path segment under the API prefix. Requests are
//! matched on whole segments, so `/api/v1/auth` matches `/api/v1/auth/login`
//! but not `/api/v1/authors`.

use std::time::Duration;

use serde::Serialize;

/// Rate class and authentication policy for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    /// The auth service: strict rate limit, authenticates its own callers.
    Auth,
    /// Everything else: general rate limit, access token required.
    Standard,
}

impl RouteClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub name: String,
    /// Path segment under the API prefix, with a leading slash.
    pub path: String,
    /// Base URL, without trailing slash.
    pub url: String,
    pub timeout: Duration,
    pub class: RouteClass,
}

impl ServiceRoute {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        class: RouteClass,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: url.into().trim_end_matches('/').to_string(),
            timeout,
            class,
        }
    }

    /// `GET` target for health probes.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url)
    }
}

/// Built-in services: (name, path, env var, default url, timeout seconds).
pub const DEFAULT_SERVICES: &[(&str, &str, &str, &str, u64)] = &[
    ("auth", "/auth", "AUTH_SERVICE_URL", "http://localhost:3001", 10),
    ("healthcare", "/healthcare", "HEALTHCARE_SERVICE_URL", "http://localhost:3003", 30),
    ("education", "/education", "EDUCATION_SERVICE_URL", "http://localhost:3004", 30),
    ("economic", "/economic", "ECONOMIC_SERVICE_URL", "http://localhost:3005", 30),
    ("data-analytics", "/data", "DATA_ANALYTICS_SERVICE_URL", "http://localhost:8000", 60),
    ("crisis", "/crisis", "CRISIS_SERVICE_URL", "http://localhost:3007", 30),
    ("ai-ml", "/ai", "AI_ML_SERVICE_URL", "http://localhost:8001", 60),
];

/// Paths under the auth service that skip token checks entirely.
const PUBLIC_AUTH_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    prefix: String,
    routes: Vec<ServiceRoute>,
}

impl ServiceRegistry {
    pub fn new(prefix: impl Into<String>, routes: Vec<ServiceRoute>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self { prefix, routes }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn routes(&self) -> &[ServiceRoute] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRoute> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Public mount point of a service, e.g. `/api/v1/auth`.
    pub fn mount_path(&self, route: &ServiceRoute) -> String {
        format!("{}{}", self.prefix, route.path)
    }

    /// Service owning `path`, longest mount point first.
    pub fn match_path(&self, path: &str) -> Option<&ServiceRoute> {
        self.routes
            .iter()
            .filter(|route| segment_prefix(path, &self.mount_path(route)))
            .max_by_key(|route| route.path.len())
    }

    /// Paths that never require an access token.
    pub fn is_public(&self, path: &str) -> bool {
        if segment_prefix(path, "/health") {
            return true;
        }
        PUBLIC_AUTH_PATHS
            .iter()
            .any(|p| segment_prefix(path, &format!("{}{}", self.prefix, p)))
    }
}

/// `path` equals `prefix` or continues it at a `/` boundary.
fn segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
