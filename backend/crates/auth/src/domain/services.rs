//! Domain Services

use platform::password::ClearTextPassword;

use crate::error::AuthResult;

/// One-way password hash function.
///
/// Implementations are CPU-bound; callers run them on the blocking pool.
pub trait PasswordHasher: Send + Sync + 'static {
    /// Hash a password chosen at registration.
    fn hash(&self, password: &ClearTextPassword) -> AuthResult<String>;

    /// Compare a presented password against a stored hash. Unreadable hashes
    /// never match.
    fn verify(&self, password: &ClearTextPassword, stored_hash: &str) -> bool;
}
