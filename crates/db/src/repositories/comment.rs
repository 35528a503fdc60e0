//! Comment repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
};
use social_common::{AppError, AppResult, PostId};
use tokio_util::sync::CancellationToken;

use super::{CommentRepository, CommentWithAuthor, NewComment};
use crate::entities::{Comment, comment, user};
use crate::guard::QueryGuard;

/// `PostgreSQL`-backed [`CommentRepository`].
#[derive(Clone)]
pub struct PgCommentRepository {
    db: Arc<DatabaseConnection>,
    guard: QueryGuard,
}

impl PgCommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, guard: QueryGuard) -> Self {
        Self { db, guard }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(
        &self,
        comment: NewComment,
        cancel: &CancellationToken,
    ) -> AppResult<comment::Model> {
        let post_id = comment.post_id;
        let model = comment::ActiveModel {
            post_id: Set(comment.post_id),
            user_id: Set(comment.user_id),
            content: Set(comment.content),
            ..Default::default()
        };

        self.guard
            .run(cancel, async {
                model.insert(self.db.as_ref()).await.map_err(|e| {
                    // The post can vanish between the caller's check and the insert.
                    if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
                        AppError::PostNotFound(post_id)
                    } else {
                        self.guard.classify(e)
                    }
                })
            })
            .await
    }

    async fn list_by_post(
        &self,
        post_id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<CommentWithAuthor>> {
        self.guard
            .run(cancel, async {
                Comment::find()
                    .select_only()
                    .columns([
                        comment::Column::Id,
                        comment::Column::PostId,
                        comment::Column::UserId,
                        comment::Column::Content,
                        comment::Column::CreatedAt,
                    ])
                    .column_as(user::Column::Username, "username")
                    .join(JoinType::InnerJoin, comment::Relation::User.def())
                    .filter(comment::Column::PostId.eq(post_id))
                    .order_by_desc(comment::Column::CreatedAt)
                    .order_by_desc(comment::Column::Id)
                    .into_model::<CommentWithAuthor>()
                    .all(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await
    }
}
