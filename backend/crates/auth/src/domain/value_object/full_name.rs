//! Full Name Value Object

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, AuthResult};

pub const FULL_NAME_MIN_LENGTH: usize = 2;
pub const FULL_NAME_MAX_LENGTH: usize = 100;

/// Display name given at registration. Trimmed; length counted in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullName(String);

impl FullName {
    pub fn new(name: impl AsRef<str>) -> AuthResult<Self> {
        let name = name.as_ref().trim();
        let len = name.chars().count();

        if len < FULL_NAME_MIN_LENGTH {
            return Err(AuthError::Validation(format!(
                "Full name must be at least {FULL_NAME_MIN_LENGTH} characters"
            )));
        }
        if len > FULL_NAME_MAX_LENGTH {
            return Err(AuthError::Validation(format!(
                "Full name must be at most {FULL_NAME_MAX_LENGTH} characters"
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(AuthError::Validation(
                "Full name contains invalid characters".to_string(),
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
