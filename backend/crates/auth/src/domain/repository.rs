//! Repository Traits
//!
//! Ports to the external collaborators: credential store, revocation
//! registry, session cache, audit log and event sink. Implementations live
//! in the infrastructure layer.

use std::time::Duration;

use kernel::id::UserId;

use crate::domain::entity::{
    audit::AuditEntry, event::DomainEvent, session::SessionEntry, user::User,
};
use crate::domain::value_object::{email::Email, user_role::UserRole};
use crate::error::AuthResult;

/// Credential store
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Persist a new user together with its first role, atomically.
    ///
    /// Fails with `AuthError::EmailTaken` if the email already exists.
    async fn create_with_role(&self, user: &User, role: UserRole) -> AuthResult<()>;

    /// Lookup by canonical email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn roles_for(&self, user_id: &UserId) -> AuthResult<Vec<UserRole>>;

    /// Persist the failed-login counter, lock deadline and last-login time.
    async fn update_login_state(&self, user: &User) -> AuthResult<()>;
}

/// Tokens rejected despite a valid signature, until they expire naturally.
#[trait_variant::make(RevocationRegistry: Send)]
pub trait LocalRevocationRegistry {
    /// Blacklist `token` for `ttl`. Revoking twice is not an error.
    async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()>;

    async fn is_revoked(&self, token: &str) -> AuthResult<bool>;
}

/// Per-user session cache
#[trait_variant::make(SessionCache: Send)]
pub trait LocalSessionCache {
    async fn put_session(&self, entry: &SessionEntry, ttl: Duration) -> AuthResult<()>;

    async fn get_session(&self, user_id: &UserId) -> AuthResult<Option<SessionEntry>>;

    async fn delete_session(&self, user_id: &UserId) -> AuthResult<()>;
}

/// Append-only audit log
#[trait_variant::make(AuditRepository: Send)]
pub trait LocalAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()>;
}

/// At-least-once event sink
#[trait_variant::make(EventPublisher: Send)]
pub trait LocalEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> AuthResult<()>;
}

/// Everything the HTTP layer needs from a single storage backend.
pub trait AuthStore:
    UserRepository + RevocationRegistry + SessionCache + Clone + Send + Sync + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository + RevocationRegistry + SessionCache + Clone + Send + Sync + 'static
{
}
