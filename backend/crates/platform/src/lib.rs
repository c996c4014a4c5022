//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations used by both the auth service and the gateway:
//! - Environment configuration helpers
//! - Cryptographic utilities (SHA-256, random bytes)
//! - Password hashing (Argon2id) and registration policy
//! - Rate limiting infrastructure (fixed window counters)
//! - Client identification (IP, user agent, bearer token)
//! - Signed token codec (access / refresh tokens)

pub mod client;
pub mod config;
pub mod crypto;
pub mod password;
pub mod rate_limit;
pub mod token;
