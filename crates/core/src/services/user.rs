//! User service.

use std::sync::Arc;

use serde::Deserialize;
use social_common::{AppResult, UserId};
use social_db::entities::user;
use social_db::repositories::{NewUser, UserRepository};
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// Input for creating a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(email, length(max = 100))]
    pub email: String,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Register a user. Usernames and emails are unique.
    pub async fn create(
        &self,
        input: CreateUserInput,
        cancel: &CancellationToken,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self
            .users
            .create(
                NewUser {
                    username: input.username.trim().to_string(),
                    email: input.email.trim().to_lowercase(),
                },
                cancel,
            )
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: UserId, cancel: &CancellationToken) -> AppResult<user::Model> {
        self.users.get_by_id(id, cancel).await
    }
}
