//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::fmt;
use std::time::Duration;

use platform::client::TrustedProxies;
use platform::config::{
    ConfigError, DurationUnit, env_bool, env_duration, env_parse, env_string,
};
use platform::crypto::random_bytes;
use platform::rate_limit::RateLimitConfig;
use platform::token::TokenCodec;

use crate::domain::entity::user::LockoutPolicy;

/// Secrets shorter than this are accepted but logged.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret shared with the gateway
    pub token_secret: Vec<u8>,
    /// Access token lifetime (7 days)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (30 days)
    pub refresh_token_ttl: Duration,
    /// Session cache entry lifetime (7 days)
    pub session_ttl: Duration,
    /// Consecutive failures before lockout
    pub max_login_attempts: u32,
    /// How long a lockout lasts (15 minutes)
    pub lockout_duration: Duration,
    /// Revoke the presented refresh token when a new pair is minted
    pub rotate_refresh_tokens: bool,
    pub register_rate_limit: RateLimitConfig,
    pub login_rate_limit: RateLimitConfig,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Bounded queue between handlers and the side-effect worker
    pub event_queue_capacity: usize,
    /// Peers (normally the gateway) whose `X-Forwarded-For` is believed
    pub trusted_proxies: TrustedProxies,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: Vec::new(),
            access_token_ttl: Duration::from_secs(7 * 24 * 3600),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            session_ttl: Duration::from_secs(7 * 24 * 3600),
            max_login_attempts: 5,
            lockout_duration: Duration::from_secs(15 * 60),
            rotate_refresh_tokens: false,
            register_rate_limit: RateLimitConfig::per_minute(5),
            login_rate_limit: RateLimitConfig::per_minute(10),
            password_pepper: None,
            event_queue_capacity: 1024,
            trusted_proxies: TrustedProxies::default(),
        }
    }
}

impl AuthConfig {
    /// Defaults with a random token secret. Tokens do not survive a restart.
    pub fn with_random_secret() -> Self {
        Self {
            token_secret: random_bytes(RECOMMENDED_SECRET_LEN),
            ..Default::default()
        }
    }

    /// Read configuration from the environment.
    ///
    /// `JWT_SECRET` is mandatory unless `allow_random_secret` is set, in which
    /// case a random one is generated with a warning.
    pub fn from_env(allow_random_secret: bool) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let token_secret = match env_string("JWT_SECRET") {
            Some(secret) => {
                if secret.len() < RECOMMENDED_SECRET_LEN {
                    tracing::warn!(
                        length = secret.len(),
                        "JWT_SECRET is shorter than recommended"
                    );
                }
                secret.into_bytes()
            }
            None if allow_random_secret => {
                tracing::warn!("JWT_SECRET not set, using a random development secret");
                random_bytes(RECOMMENDED_SECRET_LEN)
            }
            None => return Err(ConfigError::Missing("JWT_SECRET".to_string())),
        };

        Ok(Self {
            token_secret,
            access_token_ttl: env_duration(
                "JWT_EXPIRY",
                defaults.access_token_ttl,
                DurationUnit::Seconds,
            )?,
            refresh_token_ttl: env_duration(
                "REFRESH_TOKEN_EXPIRY",
                defaults.refresh_token_ttl,
                DurationUnit::Seconds,
            )?,
            session_ttl: env_duration("SESSION_TTL", defaults.session_ttl, DurationUnit::Seconds)?,
            max_login_attempts: env_parse("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts)?,
            lockout_duration: env_duration(
                "LOCKOUT_DURATION",
                defaults.lockout_duration,
                DurationUnit::Milliseconds,
            )?,
            rotate_refresh_tokens: env_bool(
                "ROTATE_REFRESH_TOKENS",
                defaults.rotate_refresh_tokens,
            )?,
            register_rate_limit: RateLimitConfig::new(
                env_parse(
                    "REGISTER_RATE_LIMIT_MAX",
                    defaults.register_rate_limit.max_requests,
                )?,
                env_duration(
                    "REGISTER_RATE_LIMIT_WINDOW",
                    defaults.register_rate_limit.window,
                    DurationUnit::Seconds,
                )?,
            ),
            login_rate_limit: RateLimitConfig::new(
                env_parse("LOGIN_RATE_LIMIT_MAX", defaults.login_rate_limit.max_requests)?,
                env_duration(
                    "LOGIN_RATE_LIMIT_WINDOW",
                    defaults.login_rate_limit.window,
                    DurationUnit::Seconds,
                )?,
            ),
            password_pepper: env_string("PASSWORD_PEPPER").map(String::into_bytes),
            event_queue_capacity: env_parse(
                "EVENT_QUEUE_CAPACITY",
                defaults.event_queue_capacity,
            )?,
            trusted_proxies: env_parse("TRUSTED_PROXIES", defaults.trusted_proxies)?,
        })
    }

    /// Build the codec shared by every use case.
    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(&self.token_secret)
    }

    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.max_login_attempts,
            duration: self.lockout_duration,
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("max_login_attempts", &self.max_login_attempts)
            .field("lockout_duration", &self.lockout_duration)
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .field("register_rate_limit", &self.register_rate_limit)
            .field("login_rate_limit", &self.login_rate_limit)
            .field(
                "password_pepper",
                &self.password_pepper.as_ref().map(|_| "[REDACTED]"),
            )
            .field("event_queue_capacity", &self.event_queue_capacity)
            .field("trusted_proxies", &self.trusted_proxies)
            .finish()
    }
}
