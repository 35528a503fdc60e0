//! User repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use social_common::{AppError, AppResult, UserId};
use tokio_util::sync::CancellationToken;

use super::{NewUser, UserRepository};
use crate::entities::{User, user};
use crate::guard::QueryGuard;

/// `PostgreSQL`-backed [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    db: Arc<DatabaseConnection>,
    guard: QueryGuard,
}

impl PgUserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, guard: QueryGuard) -> Self {
        Self { db, guard }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser, cancel: &CancellationToken) -> AppResult<user::Model> {
        let model = user::ActiveModel {
            username: Set(user.username),
            email: Set(user.email),
            ..Default::default()
        };

        self.guard
            .run(cancel, async {
                model.insert(self.db.as_ref()).await.map_err(|e| self.guard.classify(e))
            })
            .await
    }

    async fn get_by_id(&self, id: UserId, cancel: &CancellationToken) -> AppResult<user::Model> {
        self.guard
            .run(cancel, async {
                User::find_by_id(id)
                    .one(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await?
            .ok_or(AppError::UserNotFound(id))
    }
}
