//! API endpoints.

mod health;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/posts", posts::router())
        .nest("/users", users::router())
}
