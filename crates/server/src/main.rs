//! Social-rs server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use social_api::AppState;
use social_common::{Config, FeedQueryBuilder};
use social_core::{CommentService, FeedService, FollowingService, PostService, UserService};
use social_db::QueryGuard;
use social_db::repositories::{
    PgCommentRepository, PgFeedAggregator, PgFollowerGraph, PgPostRepository, PgUserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body. Posts are capped well below this.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Wire the `PostgreSQL` stores into the services.
fn build_state(config: &Config, db: sea_orm::DatabaseConnection) -> AppState {
    let db = Arc::new(db);
    let guard = QueryGuard::new(config.database.query_timeout());

    let posts = Arc::new(PgPostRepository::new(db.clone(), guard));
    let comments = Arc::new(PgCommentRepository::new(db.clone(), guard));
    let users = Arc::new(PgUserRepository::new(db.clone(), guard));
    let graph = Arc::new(PgFollowerGraph::new(db.clone(), guard));
    let feed = Arc::new(PgFeedAggregator::new(db, guard));

    AppState {
        post_service: PostService::new(
            posts.clone(),
            comments.clone(),
            users.clone(),
            config.feed.max_limit,
        ),
        feed_service: FeedService::new(feed, FeedQueryBuilder::from_config(&config.feed)),
        following_service: FollowingService::new(graph, users.clone()),
        user_service: UserService::new(users.clone()),
        comment_service: CommentService::new(comments, posts, users),
        env: config.env.clone(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting social-rs server...");

    let config = Config::load().context("failed to load configuration")?;

    let db = social_db::init(&config)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    info!("Running database migrations...");
    social_db::migrate(&db)
        .await
        .context("failed to run migrations")?;
    info!("Migrations completed");

    let state = build_state(&config, db);

    let app: Router = social_api::app(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server host or port")?;
    info!(env = %config.env, query_timeout_ms = config.database.query_timeout_ms, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
