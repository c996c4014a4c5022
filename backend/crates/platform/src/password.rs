//! Password Hashing and Verification
//!
//! - Argon2id hashing with an optional application pepper
//! - Zeroization of clear text on drop
//! - Registration policy (length after NFKC normalisation, no control
//!   characters, not a trivially common password)
//!
//! Login paths use [`ClearTextPassword::for_verification`], which normalises
//! but never applies the policy, so a policy change cannot lock out existing
//! accounts.

use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ============================================================================
// Constants
// ============================================================================

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violations, reported on registration only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters")]
    TooLong { max: usize, actual: usize },

    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("Password contains invalid control characters")]
    InvalidCharacter,

    #[error("Password is too common")]
    TooCommon,
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password, erased from memory on drop.
///
/// Not `Clone`; `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Normalise (NFKC) and validate a password chosen at registration.
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        let raw = Zeroizing::new(raw);
        let normalized: String = raw.nfkc().collect();
        let password = Self(normalized);

        if password.0.trim().is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        // Length counts code points, not bytes.
        let char_count = password.0.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }
        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if password
            .0
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if is_too_common(&password.0) {
            return Err(PasswordPolicyError::TooCommon);
        }

        Ok(password)
    }

    /// Normalise a password presented at login. No policy is applied.
    pub fn for_verification(raw: String) -> Self {
        let raw = Zeroizing::new(raw);
        Self(raw.nfkc().collect())
    }

    fn peppered(&self, pepper: Option<&[u8]>) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(self.0.as_bytes().to_vec());
        if let Some(p) = pepper {
            bytes.extend_from_slice(p);
        }
        bytes
    }

    /// Hash with Argon2id (default OWASP parameters, random 16-byte salt).
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(&self.peppered(pepper), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Argon2id hash in PHC string format.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Wrap a PHC string loaded from storage.
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Constant-time verification. Unparseable hashes never verify.
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(&password.peppered(pepper), &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "1234567890",
    "87654321",
    "abcdefgh",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "trustno1",
    "letmein1",
    "welcome1",
    "admin123",
];

fn is_too_common(password: &str) -> bool {
    let lower = password.to_lowercase();

    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return true;
        }
    }

    COMMON_PASSWORDS.contains(&lower.as_str())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_and_long_passwords() {
        assert!(matches!(
            ClearTextPassword::new("short".to_string()),
            Err(PasswordPolicyError::TooShort { actual: 5, .. })
        ));
        assert!(matches!(
            ClearTextPassword::new("a1".repeat(MAX_PASSWORD_LENGTH)),
            Err(PasswordPolicyError::TooLong { .. })
        ));
    }

    #[test]
    fn rejects_blank_and_control_characters() {
        assert_eq!(
            ClearTextPassword::new("         ".to_string()).unwrap_err(),
            PasswordPolicyError::EmptyOrWhitespace
        );
        assert_eq!(
            ClearTextPassword::new("abc\u{0007}defgh".to_string()).unwrap_err(),
            PasswordPolicyError::InvalidCharacter
        );
    }

    #[test]
    fn rejects_common_passwords() {
        for pw in ["password", "PASSWORD123", "12345678", "zzzzzzzzzz"] {
            assert_eq!(
                ClearTextPassword::new(pw.to_string()).unwrap_err(),
                PasswordPolicyError::TooCommon,
                "{pw}"
            );
        }
    }

    #[test]
    fn accepts_reasonable_passwords() {
        assert!(ClearTextPassword::new("Password123!".to_string()).is_ok());
        assert!(ClearTextPassword::new("パスワード安全です!".to_string()).is_ok());
    }

    #[test]
    fn verification_path_skips_policy() {
        // Too short for registration, but login must still be able to try it.
        let pw = ClearTextPassword::for_verification("abc".to_string());
        let hashed = pw.hash(None).unwrap();
        assert!(hashed.verify(&ClearTextPassword::for_verification("abc".into()), None));
    }

    #[test]
    fn hash_and_verify_with_pepper() {
        let password = ClearTextPassword::new("Password123!".to_string()).unwrap();
        let pepper = b"pepper";
        let hashed = password.hash(Some(pepper)).unwrap();

        assert!(hashed.verify(&password, Some(pepper)));
        assert!(!hashed.verify(&password, None));
        assert!(!hashed.verify(&password, Some(b"other")));

        let wrong = ClearTextPassword::for_verification("Password124!".to_string());
        assert!(!hashed.verify(&wrong, Some(pepper)));
    }

    #[test]
    fn nfkc_equivalent_inputs_verify() {
        // Full-width digits normalise to ASCII.
        let hashed = ClearTextPassword::new("Secret123!".to_string())
            .unwrap()
            .hash(None)
            .unwrap();
        let fullwidth = ClearTextPassword::for_verification("Secret１２３!".to_string());
        assert!(hashed.verify(&fullwidth, None));
    }

    #[test]
    fn phc_strings_are_validated() {
        let hashed = ClearTextPassword::new("Password123!".to_string())
            .unwrap()
            .hash(None)
            .unwrap();
        assert!(HashedPassword::from_phc_string(hashed.as_phc_string()).is_ok());
        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = ClearTextPassword::for_verification("secret-value".to_string());
        let debug_output = format!("{password:?}");
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret-value"));
    }
}
