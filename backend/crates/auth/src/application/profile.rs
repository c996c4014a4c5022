//! Profile Use Case

use std::sync::Arc;

use kernel::id::UserId;

use crate::domain::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::user_role::UserRole;
use crate::error::{AuthError, AuthResult};

pub struct ProfileOutput {
    pub user: User,
    pub roles: Vec<UserRole>,
}

pub struct ProfileUseCase<U>
where
    U: UserRepository,
{
    users: Arc<U>,
}

impl<U> ProfileUseCase<U>
where
    U: UserRepository + Sync,
{
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    pub async fn execute(&self, user_id: &UserId) -> AuthResult<ProfileOutput> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let roles = self.users.roles_for(&user.id).await?;
        Ok(ProfileOutput { user, roles })
    }
}
