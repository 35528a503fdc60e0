//! HTTP API layer for social-rs.
//!
//! - **Endpoints**: posts, comments, users, following and the feed under `/v1`
//! - **Extractors**: request user and per-request cancellation
//! - **Middleware**: request user resolution, cancel-on-disconnect
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::Router;

pub use endpoints::router;
pub use middleware::AppState;

/// The versioned API with its request middleware, ready for outer layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/v1", router())
        .layer(axum::middleware::from_fn(
            middleware::request_user_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::cancellation_middleware,
        ))
        .with_state(state)
}
