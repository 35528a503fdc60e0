//! Users endpoints: registration, the personalized feed and following.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use social_common::{AppResult, FeedParams, UserId};
use social_core::CreateUserInput;
use social_db::{entities::user, repositories::FeedRow};

use crate::{
    extractors::{Cancel, RequestUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Public view of a user. The email address is not exposed.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct FollowStatus {
    pub following: bool,
}

async fn create(
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Json(req): Json<CreateUserInput>,
) -> AppResult<(StatusCode, ApiResponse<UserResponse>)> {
    let user = state.user_service.create(req, &cancel).await?;
    Ok(ApiResponse::created(user.into()))
}

async fn show(
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.get(id, &cancel).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// The request user's feed: own posts and posts of followed users.
async fn feed(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<ApiResponse<Vec<FeedRow>>> {
    let rows = state
        .feed_service
        .get_feed(user_id, &params, &cancel)
        .await?;
    Ok(ApiResponse::ok(rows))
}

/// Follow `id` as the request user. Repeating the call is harmless.
async fn follow(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<StatusCode> {
    state
        .following_service
        .follow(id, user_id, &cancel)
        .await?;
    Ok(no_content())
}

async fn unfollow(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<StatusCode> {
    state
        .following_service
        .unfollow(id, user_id, &cancel)
        .await?;
    Ok(no_content())
}

/// Whether the request user follows `id`.
async fn follow_status(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<FollowStatus>> {
    let following = state
        .following_service
        .is_following(id, user_id, &cancel)
        .await?;
    Ok(ApiResponse::ok(FollowStatus { following }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/feed", get(feed))
        .route("/{id}", get(show))
        .route("/{id}/follow", put(follow).get(follow_status))
        .route("/{id}/unfollow", put(unfollow))
}
