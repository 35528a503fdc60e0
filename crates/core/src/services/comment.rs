//! Comment service.

use std::sync::Arc;

use serde::Deserialize;
use social_common::{AppResult, PostId, UserId};
use social_db::entities::comment;
use social_db::repositories::{
    CommentRepository, CommentWithAuthor, NewComment, PostRepository, UserRepository,
};
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// Input for commenting on a post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentInput {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
}

impl CommentService {
    #[must_use]
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            comments,
            posts,
            users,
        }
    }

    /// Comment on `post_id` as `author_id`.
    pub async fn create(
        &self,
        post_id: PostId,
        author_id: UserId,
        input: CreateCommentInput,
        cancel: &CancellationToken,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        self.posts.get_by_id(post_id, cancel).await?;
        self.users.get_by_id(author_id, cancel).await?;

        let comment = self
            .comments
            .create(
                NewComment {
                    post_id,
                    user_id: author_id,
                    content: input.content,
                },
                cancel,
            )
            .await?;

        tracing::info!(comment_id = comment.id, post_id, user_id = author_id, "comment created");
        Ok(comment)
    }

    /// Comments on a post, newest first.
    pub async fn list(
        &self,
        post_id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<CommentWithAuthor>> {
        self.posts.get_by_id(post_id, cancel).await?;
        self.comments.list_by_post(post_id, cancel).await
    }
}
