//! Store contracts and their `PostgreSQL` implementations.
//!
//! Services depend on the narrow traits declared here, never on a concrete
//! store. Every method takes the caller's [`CancellationToken`] so an
//! abandoned request stops its store work.

mod comment;
mod feed;
mod follower;
mod post;
mod user;

pub use comment::PgCommentRepository;
pub use feed::PgFeedAggregator;
pub use follower::PgFollowerGraph;
pub use post::PgPostRepository;
pub use user::PgUserRepository;

use async_trait::async_trait;
use sea_orm::FromQueryResult;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use social_common::{AppResult, FeedQuery, PostId, UserId, Version};
use tokio_util::sync::CancellationToken;

use crate::entities::{
    comment as comment_entity, post as post_entity, user as user_entity,
};

/// Fields of a post about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// A versioned change to a post.
///
/// Applied only if the stored version still equals `expected_version`.
/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostChange {
    pub id: PostId,
    pub expected_version: Version,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PostChange {
    /// Whether the change touches any content field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

/// A comment joined with its author's username.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTimeWithTimeZone,
    pub username: String,
}

/// One feed entry: a post, its author's username and its comment count.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct FeedRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub tags: Vec<String>,
    pub version: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub username: String,
    pub comments_count: i64,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post at the initial version.
    async fn create(
        &self,
        post: NewPost,
        cancel: &CancellationToken,
    ) -> AppResult<post_entity::Model>;

    async fn get_by_id(
        &self,
        id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<post_entity::Model>;

    /// Posts ordered by id, oldest first.
    async fn list(
        &self,
        limit: u64,
        offset: u64,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<post_entity::Model>>;

    /// Apply `change` as a single compare-and-set on the version.
    ///
    /// Returns the updated post, [`AppError::PostNotFound`] if the post does
    /// not exist, or [`AppError::Conflict`] if its version moved on.
    ///
    /// [`AppError::PostNotFound`]: social_common::AppError::PostNotFound
    /// [`AppError::Conflict`]: social_common::AppError::Conflict
    async fn update(
        &self,
        change: PostChange,
        cancel: &CancellationToken,
    ) -> AppResult<post_entity::Model>;

    async fn delete_by_id(&self, id: PostId, cancel: &CancellationToken) -> AppResult<()>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(
        &self,
        comment: NewComment,
        cancel: &CancellationToken,
    ) -> AppResult<comment_entity::Model>;

    /// Comments on a post, newest first.
    async fn list_by_post(
        &self,
        post_id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<CommentWithAuthor>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(
        &self,
        user: NewUser,
        cancel: &CancellationToken,
    ) -> AppResult<user_entity::Model>;

    async fn get_by_id(
        &self,
        id: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<user_entity::Model>;
}

/// Directed follow edges: `follower` follows `followed`.
#[async_trait]
pub trait FollowerGraph: Send + Sync {
    /// Record the edge. Recording an existing edge is a no-op.
    async fn follow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()>;

    /// Remove the edge. Removing a missing edge is a no-op.
    async fn unfollow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()>;

    async fn is_following(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait FeedAggregator: Send + Sync {
    /// The requester's own posts plus posts by users they follow, filtered,
    /// ordered and paged by `query`.
    async fn feed(
        &self,
        requester: UserId,
        query: &FeedQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<FeedRow>>;
}
