//! Gateway configuration

use std::fmt;
use std::time::Duration;

use platform::client::TrustedProxies;
use platform::config::{ConfigError, DurationUnit, env_duration, env_parse, env_string};
use platform::crypto::random_bytes;
use platform::rate_limit::RateLimitConfig;
use platform::token::TokenCodec;

use crate::domain::service::{DEFAULT_SERVICES, RouteClass, ServiceRegistry, ServiceRoute};

const DEV_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct GatewayConfig {
    /// Shared with the auth service; verifies access tokens.
    pub token_secret: Vec<u8>,
    pub api_prefix: String,
    pub services: Vec<ServiceRoute>,
    pub standard_rate_limit: RateLimitConfig,
    pub auth_rate_limit: RateLimitConfig,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    /// Per-service health answers younger than this are served from cache.
    pub health_cache_ttl: Duration,
    pub max_body_bytes: usize,
    /// Peers whose `X-Forwarded-For` decides the rate-limit key. Empty when
    /// the gateway is the edge.
    pub trusted_proxies: TrustedProxies,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_secret: Vec::new(),
            api_prefix: "/api/v1".to_string(),
            services: default_services(|_| None),
            standard_rate_limit: RateLimitConfig::new(100, Duration::from_millis(900_000)),
            auth_rate_limit: RateLimitConfig::new(5, Duration::from_millis(900_000)),
            health_check_interval: Duration::from_millis(30_000),
            health_check_timeout: Duration::from_millis(5_000),
            health_cache_ttl: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
            trusted_proxies: TrustedProxies::default(),
            port: 8000,
        }
    }
}

impl GatewayConfig {
    pub fn from_env(allow_random_secret: bool) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let token_secret = match env_string("JWT_SECRET") {
            Some(secret) => secret.into_bytes(),
            None if allow_random_secret => {
                tracing::warn!(
                    "JWT_SECRET not set, using a random secret; tokens from the auth service will not verify"
                );
                random_bytes(DEV_SECRET_LEN)
            }
            None => return Err(ConfigError::Missing("JWT_SECRET".to_string())),
        };

        Ok(Self {
            token_secret,
            api_prefix: env_string("API_PREFIX").unwrap_or(defaults.api_prefix),
            services: default_services(env_string),
            standard_rate_limit: RateLimitConfig::new(
                env_parse(
                    "RATE_LIMIT_MAX_REQUESTS",
                    defaults.standard_rate_limit.max_requests,
                )?,
                env_duration(
                    "RATE_LIMIT_WINDOW_MS",
                    defaults.standard_rate_limit.window,
                    DurationUnit::Milliseconds,
                )?,
            ),
            auth_rate_limit: RateLimitConfig::new(
                env_parse(
                    "AUTH_RATE_LIMIT_MAX_REQUESTS",
                    defaults.auth_rate_limit.max_requests,
                )?,
                env_duration(
                    "AUTH_RATE_LIMIT_WINDOW_MS",
                    defaults.auth_rate_limit.window,
                    DurationUnit::Milliseconds,
                )?,
            ),
            health_check_interval: env_duration(
                "HEALTH_CHECK_INTERVAL",
                defaults.health_check_interval,
                DurationUnit::Milliseconds,
            )?,
            health_check_timeout: env_duration(
                "HEALTH_CHECK_TIMEOUT",
                defaults.health_check_timeout,
                DurationUnit::Milliseconds,
            )?,
            health_cache_ttl: defaults.health_cache_ttl,
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            trusted_proxies: env_parse("TRUSTED_PROXIES", defaults.trusted_proxies)?,
            port: env_parse("PORT", defaults.port)?,
        })
    }

    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(&self.token_secret)
    }

    pub fn registry(&self) -> ServiceRegistry {
        ServiceRegistry::new(self.api_prefix.clone(), self.services.clone())
    }

    pub fn rate_limit_for(&self, class: RouteClass) -> RateLimitConfig {
        match class {
            RouteClass::Auth => self.auth_rate_limit,
            RouteClass::Standard => self.standard_rate_limit,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token_secret", &"[REDACTED]")
            .field("api_prefix", &self.api_prefix)
            .field("services", &self.services)
            .field("standard_rate_limit", &self.standard_rate_limit)
            .field("auth_rate_limit", &self.auth_rate_limit)
            .field("health_check_interval", &self.health_check_interval)
            .field("health_check_timeout", &self.health_check_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("port", &self.port)
            .finish()
    }
}

/// Built-in service table, URLs overridable through `lookup(env_var)`.
fn default_services(lookup: impl Fn(&str) -> Option<String>) -> Vec<ServiceRoute> {
    DEFAULT_SERVICES
        .iter()
        .map(|(name, path, var, default_url, timeout_secs)| {
            let class = if *name == "auth" {
                RouteClass::Auth
            } else {
                RouteClass::Standard
            };
            ServiceRoute::new(
                *name,
                *path,
                lookup(var).unwrap_or_else(|| default_url.to_string()),
                Duration::from_secs(*timeout_secs),
                class,
            )
        })
        .collect()
}
