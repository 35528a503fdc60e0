//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use social_core::{CommentService, FeedService, FollowingService, PostService, UserService};
use social_common::UserId;
use tokio_util::sync::CancellationToken;

/// Header naming the acting user. Stands in for a real session layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub post_service: PostService,
    pub feed_service: FeedService,
    pub following_service: FollowingService,
    pub user_service: UserService,
    pub comment_service: CommentService,
    /// Deployment environment, reported by the health endpoint.
    pub env: String,
}

/// The user a request acts as, once resolved from its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedUser(pub UserId);

/// Resolve the acting user from the `X-User-Id` header.
///
/// Requests without a valid header pass through unresolved; handlers that
/// need a user reject them.
pub async fn request_user_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(raw) = req.headers().get(USER_ID_HEADER).cloned() {
        match raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .filter(|id| *id > 0)
        {
            Some(user_id) => {
                req.extensions_mut().insert(ResolvedUser(user_id));
            }
            None => tracing::debug!(header = ?raw, "Ignoring malformed user header"),
        }
    }

    next.run(req).await
}

/// Give each request a cancellation token that fires when the request is
/// abandoned, including when the client disconnects mid-flight.
pub async fn cancellation_middleware(mut req: Request<Body>, next: Next) -> Response {
    let token = CancellationToken::new();
    req.extensions_mut().insert(token.clone());

    let _guard = token.drop_guard();
    next.run(req).await
}
