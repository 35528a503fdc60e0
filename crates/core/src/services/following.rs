//! Following service.

use std::sync::Arc;

use social_common::{AppError, AppResult, UserId};
use social_db::repositories::{FollowerGraph, UserRepository};
use tokio_util::sync::CancellationToken;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    graph: Arc<dyn FollowerGraph>,
    users: Arc<dyn UserRepository>,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub fn new(graph: Arc<dyn FollowerGraph>, users: Arc<dyn UserRepository>) -> Self {
        Self { graph, users }
    }

    /// Make `follower_id` follow `followed_id`.
    ///
    /// Following someone already followed succeeds without change.
    pub async fn follow(
        &self,
        followed_id: UserId,
        follower_id: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        if followed_id == follower_id {
            return Err(AppError::validation("user_id", "cannot follow yourself"));
        }

        self.users.get_by_id(followed_id, cancel).await?;
        self.users.get_by_id(follower_id, cancel).await?;

        self.graph.follow(followed_id, follower_id, cancel).await?;
        tracing::info!(followed_id, follower_id, "followed");
        Ok(())
    }

    /// Remove the follow edge, if any.
    pub async fn unfollow(
        &self,
        followed_id: UserId,
        follower_id: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.graph.unfollow(followed_id, follower_id, cancel).await?;
        tracing::info!(followed_id, follower_id, "unfollowed");
        Ok(())
    }

    /// Whether `follower_id` currently follows `followed_id`.
    pub async fn is_following(
        &self,
        followed_id: UserId,
        follower_id: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        self.graph
            .is_following(followed_id, follower_id, cancel)
            .await
    }
}
