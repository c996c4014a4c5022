//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod events;
pub mod hasher;
pub mod memory;
pub mod postgres;

pub use events::LogEventPublisher;
pub use hasher::Argon2PasswordHasher;
pub use memory::MemoryAuthStore;
pub use postgres::PgAuthRepository;
