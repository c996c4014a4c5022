//! User Entity
//!
//! Identity record plus the account-lockout state machine.
//!
//! ```text
//!            wrong password, count < max
//!              ┌──────────────┐
//!              ▼              │
//!   ┌────────────────┐ ───────┘        ┌──────────────────┐
//!   │     Active     │ ──────────────▶ │  Locked(until)   │
//!   └────────────────┘  wrong password └──────────────────┘
//!          ▲             count >= max           │
//!          └──────────── now >= until ──────────┘
//! ```
//!
//! A correct password while `Active` resets the counter. Attempts while
//! `Locked` are rejected without touching the counter. The counter is not
//! reset when a lock expires; only a successful login clears it, so one more
//! wrong password right after expiry locks the account again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::value_object::{email::Email, full_name::FullName};

/// Thresholds for the lockout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub duration: Duration,
}

/// Lockout state as observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Active,
    Locked { until: DateTime<Utc> },
}

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Opaque output of the password hasher. Never leaves the service.
    pub password_hash: String,
    pub full_name: FullName,
    pub phone_number: Option<String>,
    pub country_code: Option<String>,
    /// Soft deactivation flag; users are never deleted here.
    pub is_active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, active user
    pub fn new(
        email: Email,
        password_hash: String,
        full_name: FullName,
        phone_number: Option<String>,
        country_code: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            password_hash,
            full_name,
            phone_number,
            country_code,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn login_state(&self, now: DateTime<Utc>) -> LoginState {
        match self.locked_until {
            Some(until) if now < until => LoginState::Locked { until },
            _ => LoginState::Active,
        }
    }

    /// Count a wrong password. Returns the resulting state.
    ///
    /// Callers must have checked [`login_state`](Self::login_state) first;
    /// failures while locked are not counted.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> LoginState {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        self.updated_at = now;

        if self.failed_login_attempts >= policy.max_attempts {
            let duration = chrono::Duration::from_std(policy.duration)
                .unwrap_or(chrono::Duration::MAX);
            let until = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.locked_until = Some(until);
        }

        self.login_state(now)
    }

    pub fn record_successful_login(&mut self, now: DateTime<Utc>) {
        self.failed_login_attempts = 0;
        self.locked_until = None;
        self.last_login = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: 5,
            duration: Duration::from_secs(15 * 60),
        }
    }

    fn user() -> User {
        User::new(
            Email::new("alice@example.com").unwrap(),
            "$argon2id$stub".to_string(),
            FullName::new("Alice").unwrap(),
            None,
            None,
        )
    }

    #[test]
    fn locks_when_counter_reaches_max() {
        let mut user = user();
        let now = Utc::now();

        for attempt in 1..5 {
            assert_eq!(user.record_failed_login(now, &policy()), LoginState::Active);
            assert_eq!(user.failed_login_attempts, attempt);
        }

        let state = user.record_failed_login(now, &policy());
        assert_eq!(
            state,
            LoginState::Locked {
                until: now + chrono::Duration::minutes(15)
            }
        );
    }

    #[test]
    fn lock_expires_naturally() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(now, &policy());
        }

        let just_before = now + chrono::Duration::minutes(15) - chrono::Duration::seconds(1);
        assert!(matches!(user.login_state(just_before), LoginState::Locked { .. }));

        let at_expiry = now + chrono::Duration::minutes(15);
        assert_eq!(user.login_state(at_expiry), LoginState::Active);
    }

    #[test]
    fn success_resets_counter_and_lock() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(now, &policy());
        }

        let later = now + chrono::Duration::minutes(20);
        user.record_successful_login(later);

        assert_eq!(user.failed_login_attempts, 0);
        assert_eq!(user.locked_until, None);
        assert_eq!(user.last_login, Some(later));
        assert_eq!(user.login_state(later), LoginState::Active);
    }

    #[test]
    fn failure_right_after_expiry_relocks() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(now, &policy());
        }

        let later = now + chrono::Duration::minutes(16);
        assert_eq!(user.login_state(later), LoginState::Active);
        assert!(matches!(
            user.record_failed_login(later, &policy()),
            LoginState::Locked { .. }
        ));
    }
}
