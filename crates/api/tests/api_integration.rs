//! API integration tests.
//!
//! These drive the full router over the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use social_api::{AppState, app};
use social_common::FeedQueryBuilder;
use social_core::{CommentService, FeedService, FollowingService, PostService, UserService};
use social_db::MemoryStore;
use tower::ServiceExt;

fn create_test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        post_service: PostService::new(store.clone(), store.clone(), store.clone(), 100),
        feed_service: FeedService::new(store.clone(), FeedQueryBuilder::new(20, 100)),
        following_service: FollowingService::new(store.clone(), store.clone()),
        user_service: UserService::new(store.clone()),
        comment_service: CommentService::new(store.clone(), store.clone(), store),
        env: "test".to_string(),
    };
    app(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/v1/users",
        None,
        Some(json!({ "username": username, "email": format!("{username}@example.com") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_i64().unwrap()
}

async fn publish(app: &Router, author: i64, title: &str, tags: &[&str]) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/v1/posts",
        Some(author),
        Some(json!({ "title": title, "content": format!("{title} body"), "tags": tags })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["version"], 1);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let (status, body) = send(&app, "GET", "/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["env"], "test");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/posts",
        None,
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_user_email_not_exposed() {
    let app = create_test_app();
    let id = register(&app, "alice").await;

    let (status, body) = send(&app, "GET", &format!("/v1/users/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("email").is_none());
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = create_test_app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/users",
        None,
        Some(json!({ "username": "alice", "email": "other@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_versioned_update_flow() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;
    let post = publish(&app, alice, "draft", &[]).await;
    let uri = format!("/v1/posts/{post}");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(alice),
        Some(json!({ "version": 1, "title": "final" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["title"], "final");

    // Writer that still holds version 1
    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(alice),
        Some(json!({ "version": 1, "content": "late edit" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["content"], "draft body");
}

#[tokio::test]
async fn test_update_without_changes_rejected() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;
    let post = publish(&app, alice, "draft", &[]).await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/v1/posts/{post}"),
        Some(alice),
        Some(json!({ "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_post_with_comments_and_delete() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = publish(&app, alice, "hello", &[]).await;
    let uri = format!("/v1/posts/{post}");

    let (status, _) = send(
        &app,
        "POST",
        &format!("{uri}/comments"),
        Some(bob),
        Some(json!({ "content": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "hello");
    assert_eq!(body["data"]["comments"][0]["username"], "bob");

    let (status, body) = send(&app, "DELETE", &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "POST_NOT_FOUND");

    let (status, _) = send(&app, "DELETE", &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_posts_paged() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;
    let first = publish(&app, alice, "one", &[]).await;
    let second = publish(&app, alice, "two", &[]).await;
    publish(&app, alice, "three", &[]).await;

    let (status, body) = send(&app, "GET", "/v1/posts?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [first, second]);

    let (status, _) = send(&app, "GET", "/v1/posts?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_follows_and_counts() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    let own = publish(&app, alice, "mine", &["rust"]).await;
    let followed = publish(&app, bob, "from bob", &["go"]).await;
    publish(&app, carol, "from carol", &["rust"]).await;

    let (status, _) = send(&app, "PUT", &format!("/v1/users/{bob}/follow"), Some(alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Second follow is a no-op
    let (status, _) = send(&app, "PUT", &format!("/v1/users/{bob}/follow"), Some(alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", &format!("/v1/users/{bob}/follow"), Some(alice), None).await;
    assert_eq!(body["data"]["following"], true);

    send(
        &app,
        "POST",
        &format!("/v1/posts/{followed}/comments"),
        Some(carol),
        Some(json!({ "content": "hi bob" })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/v1/users/feed", Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, [followed, own]);
    assert_eq!(rows[0]["username"], "bob");
    assert_eq!(rows[0]["comments_count"], 1);
    assert_eq!(rows[1]["comments_count"], 0);

    let (_, body) = send(&app, "GET", "/v1/users/feed?tags=rust&sort=asc", Some(alice), None).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [own]);

    let (status, _) =
        send(&app, "PUT", &format!("/v1/users/{bob}/unfollow"), Some(alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/v1/users/feed", Some(alice), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_feed_rejects_invalid_params() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;

    for (query, field) in [
        ("sort=sideways", "sort"),
        ("limit=-1", "limit"),
        ("limit=1000", "limit"),
        ("since=yesterday", "since"),
        ("tags=,,", "tags"),
    ] {
        let (status, body) = send(
            &app,
            "GET",
            &format!("/v1/users/feed?{query}"),
            Some(alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert_eq!(body["error"]["field"], field, "{query}");
    }
}

#[tokio::test]
async fn test_follow_rules() {
    let app = create_test_app();
    let alice = register(&app, "alice").await;

    let (status, body) =
        send(&app, "PUT", &format!("/v1/users/{alice}/follow"), Some(alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "user_id");

    let (status, body) = send(&app, "PUT", "/v1/users/9999/follow", Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");

    // Unfollowing someone not followed succeeds
    let (status, _) = send(&app, "PUT", "/v1/users/9999/unfollow", Some(alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
