//! Login Use Case
//!
//! Verifies credentials and drives the lockout state machine on [`User`].
//!
//! Check order: account lookup, lock, active flag, password. Every "who are
//! you" failure collapses into `InvalidCredentials` so the response never
//! reveals whether the email exists.

use std::sync::Arc;

use chrono::Utc;
use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use serde_json::json;

use crate::application::services::{AuthServices, TokenPair};
use crate::domain::entity::{
    audit::{AuditEntry, AuditEventType},
    event::DomainEvent,
    session::SessionEntry,
};
use crate::domain::repository::{SessionCache, UserRepository};
use crate::domain::value_object::{email::Email, user_role::UserRole};
use crate::domain::{LoginState, User};
use crate::error::{AuthError, AuthResult};

/// Login input
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub client: ClientInfo,
}

/// Login output
pub struct LoginOutput {
    pub user: User,
    pub roles: Vec<UserRole>,
    pub tokens: TokenPair,
}

/// Login use case
pub struct LoginUseCase<U, S>
where
    U: UserRepository,
    S: SessionCache,
{
    users: Arc<U>,
    sessions: Arc<S>,
    services: AuthServices,
}

impl<U, S> LoginUseCase<U, S>
where
    U: UserRepository + Sync + 'static,
    S: SessionCache + Sync,
{
    pub fn new(users: Arc<U>, sessions: Arc<S>, services: AuthServices) -> Self {
        Self {
            users,
            sessions,
            services,
        }
    }

    pub async fn execute(&self, input: LoginInput) -> AuthResult<LoginOutput> {
        let email = Email::new(&input.email)?;
        let password = ClearTextPassword::for_verification(input.password);

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now();
        if let LoginState::Locked { until } = user.login_state(now) {
            tracing::warn!(user_id = %user.id, locked_until = %until, "Login rejected, account locked");
            return Err(AuthError::AccountLocked);
        }

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let hasher = self.services.hasher.clone();
        let stored_hash = user.password_hash.clone();
        let password_ok =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash)).await?;

        // Hashing takes a while; stamp the outcome with the time it was known.
        let now = Utc::now();
        if !password_ok {
            let policy = self.services.config.lockout_policy();
            let state = user.record_failed_login(now, &policy);
            self.persist_login_state(&user).await?;

            if let LoginState::Locked { until } = state {
                tracing::warn!(
                    user_id = %user.id,
                    failed_attempts = user.failed_login_attempts,
                    locked_until = %until,
                    "Account locked after repeated failed logins"
                );
            }

            self.services.dispatcher.audit(AuditEntry::new(
                Some(user.id),
                AuditEventType::LoginFailed,
                json!({ "email": email.as_str() }),
                &input.client,
            ));
            return Err(AuthError::InvalidCredentials);
        }

        user.record_successful_login(now);
        self.persist_login_state(&user).await?;

        let roles = self.users.roles_for(&user.id).await?;
        let tokens = self.services.issue_token_pair(&user, &roles)?;

        let session = SessionEntry {
            user_id: user.id,
            email: user.email.to_string(),
            roles: roles.iter().map(|r| r.code().to_string()).collect(),
            ip: input.client.ip.map(|ip| ip.to_string()),
            user_agent: input.client.user_agent.clone(),
            login_at: now,
        };
        if let Err(e) = self
            .sessions
            .put_session(&session, self.services.config.session_ttl)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to cache session");
        }

        tracing::info!(user_id = %user.id, "User logged in");

        let dispatcher = &self.services.dispatcher;
        dispatcher.event(DomainEvent::UserLoggedIn {
            user_id: user.id,
            ip: session.ip.clone(),
            user_agent: session.user_agent.clone(),
        });
        dispatcher.audit(AuditEntry::new(
            Some(user.id),
            AuditEventType::UserLoggedIn,
            json!({}),
            &input.client,
        ));

        Ok(LoginOutput {
            user,
            roles,
            tokens,
        })
    }

    /// Write counters on a detached task so a disconnecting client cannot
    /// cancel the update halfway.
    async fn persist_login_state(&self, user: &User) -> AuthResult<()> {
        let users = self.users.clone();
        let user = user.clone();
        tokio::spawn(async move { users.update_login_state(&user).await }).await?
    }
}
