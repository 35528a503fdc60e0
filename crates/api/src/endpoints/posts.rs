//! Posts endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use social_common::{AppResult, PostId};
use social_core::{CreateCommentInput, CreatePostInput, PostWithComments, UpdatePostInput};
use social_db::entities::{comment, post};

use crate::{
    extractors::{Cancel, RequestUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Paging for the plain post listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Create a post authored by the request user.
async fn create(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Json(req): Json<CreatePostInput>,
) -> AppResult<(StatusCode, ApiResponse<post::Model>)> {
    let post = state.post_service.create(user_id, req, &cancel).await?;
    Ok(ApiResponse::created(post))
}

/// List posts by id.
async fn list(
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<ApiResponse<Vec<post::Model>>> {
    let posts = state
        .post_service
        .list(query.limit, query.offset, &cancel)
        .await?;
    Ok(ApiResponse::ok(posts))
}

/// Show a post with its comments.
async fn show(
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<PostWithComments>> {
    let post = state.post_service.get(id, &cancel).await?;
    Ok(ApiResponse::ok(post))
}

/// Apply a versioned update. A stale `version` yields 409.
async fn update(
    RequestUser(_): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(req): Json<UpdatePostInput>,
) -> AppResult<ApiResponse<post::Model>> {
    let post = state.post_service.update(id, req, &cancel).await?;
    Ok(ApiResponse::ok(post))
}

async fn delete(
    RequestUser(_): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> AppResult<StatusCode> {
    state.post_service.delete(id, &cancel).await?;
    Ok(no_content())
}

/// Comment on a post as the request user.
async fn create_comment(
    RequestUser(user_id): RequestUser,
    Cancel(cancel): Cancel,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(req): Json<CreateCommentInput>,
) -> AppResult<(StatusCode, ApiResponse<comment::Model>)> {
    let comment = state
        .comment_service
        .create(id, user_id, req, &cancel)
        .await?;
    Ok(ApiResponse::created(comment))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/{id}", get(show).patch(update).delete(delete))
        .route("/{id}/comments", post(create_comment))
}
