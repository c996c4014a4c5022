//! Register Use Case
//!
//! Creates a user with the default role and signs them in.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use serde_json::json;

use crate::application::services::{AuthServices, TokenPair};
use crate::domain::User;
use crate::domain::entity::{
    audit::{AuditEntry, AuditEventType},
    event::DomainEvent,
};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, full_name::FullName, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Register input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub country_code: Option<String>,
    pub client: ClientInfo,
}

/// Register output
pub struct RegisterOutput {
    pub user: User,
    pub tokens: TokenPair,
}

/// Register use case
pub struct RegisterUseCase<U>
where
    U: UserRepository,
{
    users: Arc<U>,
    services: AuthServices,
}

impl<U> RegisterUseCase<U>
where
    U: UserRepository + Sync,
{
    pub fn new(users: Arc<U>, services: AuthServices) -> Self {
        Self { users, services }
    }

    pub async fn execute(&self, input: RegisterInput) -> AuthResult<RegisterOutput> {
        let email = Email::new(&input.email)?;
        let full_name = FullName::new(&input.full_name)?;
        let password = ClearTextPassword::new(input.password)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let phone_number = non_blank(input.phone_number);
        let country_code = non_blank(input.country_code);

        // Fast path; the store's unique constraint still guards against races.
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let hasher = self.services.hasher.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

        let user = User::new(email, password_hash, full_name, phone_number, country_code);
        let role = UserRole::default();

        // User row and role assignment succeed or fail together.
        self.users.create_with_role(&user, role).await?;

        let tokens = self.services.issue_token_pair(&user, &[role])?;

        tracing::info!(user_id = %user.id, "User registered");

        let dispatcher = &self.services.dispatcher;
        dispatcher.event(DomainEvent::UserRegistered {
            user_id: user.id,
            email: user.email.to_string(),
            full_name: user.full_name.to_string(),
        });
        dispatcher.audit(AuditEntry::new(
            Some(user.id),
            AuditEventType::UserRegistered,
            json!({ "email": user.email.as_str() }),
            &input.client,
        ));

        Ok(RegisterOutput { user, tokens })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
