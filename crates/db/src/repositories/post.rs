//! Post repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::Expr,
};
use social_common::{AppError, AppResult, PostId, Version};
use tokio_util::sync::CancellationToken;

use super::{NewPost, PostChange, PostRepository};
use crate::entities::{Post, post};
use crate::guard::QueryGuard;

/// `PostgreSQL`-backed [`PostRepository`].
#[derive(Clone)]
pub struct PgPostRepository {
    db: Arc<DatabaseConnection>,
    guard: QueryGuard,
}

impl PgPostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, guard: QueryGuard) -> Self {
        Self { db, guard }
    }

    async fn find_by_id(
        &self,
        id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<Option<post::Model>> {
        self.guard
            .run(cancel, async {
                Post::find_by_id(id)
                    .one(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: NewPost, cancel: &CancellationToken) -> AppResult<post::Model> {
        let model = post::ActiveModel {
            title: Set(post.title),
            content: Set(post.content),
            user_id: Set(post.user_id),
            tags: Set(post.tags),
            version: Set(Version::INITIAL.get()),
            ..Default::default()
        };

        self.guard
            .run(cancel, async {
                model.insert(self.db.as_ref()).await.map_err(|e| self.guard.classify(e))
            })
            .await
    }

    async fn get_by_id(&self, id: PostId, cancel: &CancellationToken) -> AppResult<post::Model> {
        self.find_by_id(id, cancel)
            .await?
            .ok_or(AppError::PostNotFound(id))
    }

    async fn list(
        &self,
        limit: u64,
        offset: u64,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<post::Model>> {
        self.guard
            .run(cancel, async {
                Post::find()
                    .order_by_asc(post::Column::Id)
                    .limit(limit)
                    .offset(offset)
                    .all(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await
    }

    async fn update(
        &self,
        change: PostChange,
        cancel: &CancellationToken,
    ) -> AppResult<post::Model> {
        let PostChange {
            id,
            expected_version,
            title,
            content,
        } = change;

        let mut stmt = Post::update_many()
            .col_expr(
                post::Column::Version,
                Expr::col(post::Column::Version).add(1),
            )
            .col_expr(post::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::Version.eq(expected_version.get()));
        if let Some(title) = title {
            stmt = stmt.col_expr(post::Column::Title, Expr::value(title));
        }
        if let Some(content) = content {
            stmt = stmt.col_expr(post::Column::Content, Expr::value(content));
        }

        let updated = self
            .guard
            .run(cancel, async {
                stmt.exec_with_returning(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await?;

        if let Some(post) = updated.into_iter().next() {
            tracing::debug!(post_id = id, version = post.version, "post updated");
            return Ok(post);
        }

        // Nothing matched: either the post is gone or its version moved on.
        match self.find_by_id(id, cancel).await? {
            None => Err(AppError::PostNotFound(id)),
            Some(current) => {
                tracing::debug!(
                    post_id = id,
                    expected = expected_version.get(),
                    current = current.version,
                    "stale post update rejected"
                );
                Err(AppError::Conflict(format!(
                    "post {id} is at version {}, expected {expected_version}",
                    current.version
                )))
            }
        }
    }

    async fn delete_by_id(&self, id: PostId, cancel: &CancellationToken) -> AppResult<()> {
        let result = self
            .guard
            .run(cancel, async {
                Post::delete_by_id(id)
                    .exec(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::PostNotFound(id));
        }
        Ok(())
    }
}
