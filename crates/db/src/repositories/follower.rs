//! Follower graph repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    sea_query::OnConflict,
};
use social_common::{AppError, AppResult, UserId};
use tokio_util::sync::CancellationToken;

use super::FollowerGraph;
use crate::entities::{Follower, follower};
use crate::guard::QueryGuard;

/// `PostgreSQL`-backed [`FollowerGraph`].
#[derive(Clone)]
pub struct PgFollowerGraph {
    db: Arc<DatabaseConnection>,
    guard: QueryGuard,
}

impl PgFollowerGraph {
    /// Create a new follower graph.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, guard: QueryGuard) -> Self {
        Self { db, guard }
    }
}

#[async_trait]
impl FollowerGraph for PgFollowerGraph {
    async fn follow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let edge = follower::ActiveModel {
            user_id: Set(followed),
            follower_id: Set(follower),
            ..Default::default()
        };

        let inserted = self
            .guard
            .run(cancel, async {
                Follower::insert(edge)
                    .on_conflict(
                        OnConflict::columns([
                            follower::Column::UserId,
                            follower::Column::FollowerId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.db.as_ref())
                    .await
                    .map_err(|e| {
                        if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
                            AppError::UserNotFound(followed)
                        } else {
                            self.guard.classify(e)
                        }
                    })
            })
            .await?;

        if inserted == 0 {
            tracing::debug!(followed, follower, "follow edge already present");
        }
        Ok(())
    }

    async fn unfollow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let result = self
            .guard
            .run(cancel, async {
                Follower::delete_many()
                    .filter(follower::Column::UserId.eq(followed))
                    .filter(follower::Column::FollowerId.eq(follower))
                    .exec(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await?;

        if result.rows_affected == 0 {
            tracing::debug!(followed, follower, "no follow edge to remove");
        }
        Ok(())
    }

    async fn is_following(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        let edge = self
            .guard
            .run(cancel, async {
                Follower::find_by_id((followed, follower))
                    .one(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await?;
        Ok(edge.is_some())
    }
}
