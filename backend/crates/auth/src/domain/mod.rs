//! Domain Layer
//!
//! Contains entities, value objects, repository traits and domain services.

pub mod entity;
pub mod repository;
pub mod services;
pub mod value_object;

// Re-exports
pub use entity::user::{LockoutPolicy, LoginState, User};
pub use repository::{
    AuditRepository, AuthStore, EventPublisher, RevocationRegistry, SessionCache, UserRepository,
};
pub use services::PasswordHasher;
