use serde::{Deserialize, Serialize};
use std::fmt;

/// Role label granted to a user. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            User => "user",
            Moderator => "moderator",
            Admin => "admin",
        }
    }

    /// Unknown codes are ignored rather than treated as errors; roles are
    /// granted out of band and may include labels this service does not use.
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        use UserRole::*;
        match code {
            "user" => Some(User),
            "moderator" => Some(Moderator),
            "admin" => Some(Admin),
            _ => None,
        }
    }

    /// Highest-privilege role, the one carried in access tokens.
    pub fn primary(roles: &[UserRole]) -> UserRole {
        roles.iter().copied().max().unwrap_or_default()
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_from_code() {
        assert_eq!(UserRole::from_code("user"), Some(UserRole::User));
        assert_eq!(UserRole::from_code("moderator"), Some(UserRole::Moderator));
        assert_eq!(UserRole::from_code("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_code("root"), None);
    }

    #[test]
    fn test_user_role_display() {
        assert_eq!(UserRole::User.to_string(), "user");
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_primary_role() {
        assert_eq!(UserRole::primary(&[]), UserRole::User);
        assert_eq!(
            UserRole::primary(&[UserRole::User, UserRole::Admin, UserRole::Moderator]),
            UserRole::Admin
        );
    }
}
