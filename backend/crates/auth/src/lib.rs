//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database, in-memory and hashing implementations
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Registration and email + password login issuing access/refresh JWTs
//! - Refresh token exchange, optionally rotating the presented token
//! - Logout through a revocation registry keyed by token hash
//! - Account lockout after repeated failed logins
//! - Role assignments, the primary role carried in the access token
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional server-side pepper
//! - Login failures never reveal whether an email is registered
//! - Revoked tokens are rejected until their natural expiry
//! - Audit and event side effects never fail the request that caused them

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{AuthServices, SideEffectDispatcher, spawn_side_effect_worker};
pub use error::{AuthError, AuthResult};
pub use infra::{Argon2PasswordHasher, LogEventPublisher, MemoryAuthStore, PgAuthRepository};
pub use presentation::router::{auth_router, auth_router_generic, health_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
