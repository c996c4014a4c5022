//! Argon2id password hasher

use platform::password::{ClearTextPassword, HashedPassword};

use crate::domain::services::PasswordHasher;
use crate::error::{AuthError, AuthResult};

/// Argon2id with an optional server-side pepper.
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher {
    pepper: Option<Vec<u8>>,
}

impl Argon2PasswordHasher {
    pub fn new(pepper: Option<Vec<u8>>) -> Self {
        Self { pepper }
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &ClearTextPassword) -> AuthResult<String> {
        let hashed = password
            .hash(self.pepper.as_deref())
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(hashed.as_phc_string().to_string())
    }

    fn verify(&self, password: &ClearTextPassword, stored_hash: &str) -> bool {
        match HashedPassword::from_phc_string(stored_hash) {
            Ok(hashed) => hashed.verify(password, self.pepper.as_deref()),
            Err(_) => {
                tracing::error!("Stored password hash is not a valid PHC string");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash_only_with_same_pepper() {
        let hasher = Argon2PasswordHasher::new(Some(b"pepper".to_vec()));
        let password = ClearTextPassword::new("Password123!".to_string()).unwrap();
        let stored = hasher.hash(&password).unwrap();

        let presented = ClearTextPassword::for_verification("Password123!".to_string());
        assert!(hasher.verify(&presented, &stored));

        let unpeppered = Argon2PasswordHasher::default();
        assert!(!unpeppered.verify(&presented, &stored));
    }

    #[test]
    fn garbage_hash_never_matches() {
        let hasher = Argon2PasswordHasher::default();
        let presented = ClearTextPassword::for_verification("Password123!".to_string());
        assert!(!hasher.verify(&presented, "not-a-hash"));
    }
}
