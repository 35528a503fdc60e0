//! Health endpoint.

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub env: String,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        env: state.env,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
