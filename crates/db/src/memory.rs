//! In-memory store for tests.
//!
//! Implements every store contract over a single mutex-guarded state, with
//! the same observable semantics as the `PostgreSQL` implementations: atomic
//! versioned updates, idempotent follow edges and the feed scoping rules.
//! An optional per-call latency lets tests exercise deadlines and
//! cancellation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use social_common::{
    AppError, AppResult, CommentId, FeedQuery, PostId, SortDirection, UserId, Version,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::entities::{comment, follower, post, user};
use crate::guard::QueryGuard;
use crate::repositories::{
    CommentRepository, CommentWithAuthor, FeedAggregator, FeedRow, FollowerGraph, NewComment,
    NewPost, NewUser, PostChange, PostRepository, UserRepository,
};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, user::Model>,
    posts: BTreeMap<PostId, post::Model>,
    comments: BTreeMap<CommentId, comment::Model>,
    edges: BTreeMap<(UserId, UserId), follower::Model>,
    last_id: i64,
    last_stamp: Option<DateTimeWithTimeZone>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Strictly increasing timestamps, so creation order is observable.
    fn stamp(&mut self) -> DateTimeWithTimeZone {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Shared in-memory store; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    guard: QueryGuard,
    latency: Option<Duration>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `guard` for every call instead of the default five-second one.
    #[must_use]
    pub fn with_guard(mut self, guard: QueryGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Delay every call by `latency` before it touches the data.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert a post verbatim, keeping its id and timestamps.
    pub async fn insert_post(&self, post: post::Model) {
        let mut state = self.state.lock().await;
        state.last_id = state.last_id.max(post.id);
        state.posts.insert(post.id, post);
    }

    /// Insert a user verbatim, keeping its id.
    pub async fn insert_user(&self, user: user::Model) {
        let mut state = self.state.lock().await;
        state.last_id = state.last_id.max(user.id);
        state.users.insert(user.id, user);
    }

    async fn call<T, F>(&self, cancel: &CancellationToken, op: F) -> AppResult<T>
    where
        F: FnOnce(&mut State) -> AppResult<T> + Send,
        T: Send,
    {
        self.guard
            .run(cancel, async {
                if let Some(latency) = self.latency {
                    tokio::time::sleep(latency).await;
                }
                let mut state = self.state.lock().await;
                op(&mut state)
            })
            .await
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: NewPost, cancel: &CancellationToken) -> AppResult<post::Model> {
        self.call(cancel, move |state| {
            if !state.users.contains_key(&post.user_id) {
                return Err(AppError::Storage(format!(
                    "posts.user_id references missing user {}",
                    post.user_id
                )));
            }
            let now = state.stamp();
            let model = post::Model {
                id: state.next_id(),
                title: post.title,
                content: post.content,
                user_id: post.user_id,
                tags: post.tags,
                created_at: now,
                updated_at: now,
                version: Version::INITIAL.get(),
            };
            state.posts.insert(model.id, model.clone());
            Ok(model)
        })
        .await
    }

    async fn get_by_id(&self, id: PostId, cancel: &CancellationToken) -> AppResult<post::Model> {
        self.call(cancel, |state| {
            state.posts.get(&id).cloned().ok_or(AppError::PostNotFound(id))
        })
        .await
    }

    async fn list(
        &self,
        limit: u64,
        offset: u64,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<post::Model>> {
        self.call(cancel, |state| {
            Ok(state
                .posts
                .values()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(limit as usize)
                .cloned()
                .collect())
        })
        .await
    }

    async fn update(
        &self,
        change: PostChange,
        cancel: &CancellationToken,
    ) -> AppResult<post::Model> {
        self.call(cancel, move |state| {
            let now = state.stamp();
            let post = state
                .posts
                .get_mut(&change.id)
                .ok_or(AppError::PostNotFound(change.id))?;
            if post.version() != change.expected_version {
                return Err(AppError::Conflict(format!(
                    "post {} is at version {}, expected {}",
                    change.id, post.version, change.expected_version
                )));
            }
            let next = post.version().next().ok_or_else(|| {
                AppError::Storage(format!("post {} has exhausted its version counter", change.id))
            })?;
            if let Some(title) = change.title {
                post.title = title;
            }
            if let Some(content) = change.content {
                post.content = content;
            }
            post.version = next.get();
            post.updated_at = now;
            Ok(post.clone())
        })
        .await
    }

    async fn delete_by_id(&self, id: PostId, cancel: &CancellationToken) -> AppResult<()> {
        self.call(cancel, |state| {
            state.posts.remove(&id).ok_or(AppError::PostNotFound(id))?;
            state.comments.retain(|_, c| c.post_id != id);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(
        &self,
        comment: NewComment,
        cancel: &CancellationToken,
    ) -> AppResult<comment::Model> {
        self.call(cancel, move |state| {
            if !state.posts.contains_key(&comment.post_id) {
                return Err(AppError::PostNotFound(comment.post_id));
            }
            let model = comment::Model {
                id: state.next_id(),
                post_id: comment.post_id,
                user_id: comment.user_id,
                content: comment.content,
                created_at: state.stamp(),
            };
            state.comments.insert(model.id, model.clone());
            Ok(model)
        })
        .await
    }

    async fn list_by_post(
        &self,
        post_id: PostId,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<CommentWithAuthor>> {
        self.call(cancel, |state| {
            let mut comments: Vec<CommentWithAuthor> = state
                .comments
                .values()
                .filter(|c| c.post_id == post_id)
                .filter_map(|c| {
                    state.users.get(&c.user_id).map(|u| CommentWithAuthor {
                        id: c.id,
                        post_id: c.post_id,
                        user_id: c.user_id,
                        content: c.content.clone(),
                        created_at: c.created_at,
                        username: u.username.clone(),
                    })
                })
                .collect();
            comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(comments)
        })
        .await
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser, cancel: &CancellationToken) -> AppResult<user::Model> {
        self.call(cancel, move |state| {
            if state
                .users
                .values()
                .any(|u| u.username == user.username || u.email == user.email)
            {
                return Err(AppError::Conflict(
                    "username or email already taken".to_string(),
                ));
            }
            let model = user::Model {
                id: state.next_id(),
                username: user.username,
                email: user.email,
                created_at: state.stamp(),
            };
            state.users.insert(model.id, model.clone());
            Ok(model)
        })
        .await
    }

    async fn get_by_id(&self, id: UserId, cancel: &CancellationToken) -> AppResult<user::Model> {
        self.call(cancel, |state| {
            state.users.get(&id).cloned().ok_or(AppError::UserNotFound(id))
        })
        .await
    }
}

#[async_trait]
impl FollowerGraph for MemoryStore {
    async fn follow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.call(cancel, |state| {
            for id in [followed, follower] {
                if !state.users.contains_key(&id) {
                    return Err(AppError::UserNotFound(id));
                }
            }
            if !state.edges.contains_key(&(followed, follower)) {
                let edge = follower::Model {
                    user_id: followed,
                    follower_id: follower,
                    created_at: state.stamp(),
                };
                state.edges.insert((followed, follower), edge);
            }
            Ok(())
        })
        .await
    }

    async fn unfollow(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.call(cancel, |state| {
            state.edges.remove(&(followed, follower));
            Ok(())
        })
        .await
    }

    async fn is_following(
        &self,
        followed: UserId,
        follower: UserId,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        self.call(cancel, |state| {
            Ok(state.edges.contains_key(&(followed, follower)))
        })
        .await
    }
}

#[async_trait]
impl FeedAggregator for MemoryStore {
    async fn feed(
        &self,
        requester: UserId,
        query: &FeedQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<FeedRow>> {
        self.call(cancel, |state| {
            let mut comment_counts: HashMap<PostId, i64> = HashMap::new();
            for c in state.comments.values() {
                *comment_counts.entry(c.post_id).or_default() += 1;
            }
            let needle = query.search().map(str::to_lowercase);

            let mut rows: Vec<FeedRow> = state
                .posts
                .values()
                .filter(|p| {
                    p.user_id == requester || state.edges.contains_key(&(p.user_id, requester))
                })
                .filter(|p| {
                    query.tags().is_empty() || p.tags.iter().any(|t| query.tags().contains(t))
                })
                .filter(|p| {
                    needle.as_deref().is_none_or(|n| {
                        p.title.to_lowercase().contains(n) || p.content.to_lowercase().contains(n)
                    })
                })
                .filter(|p| {
                    let created = p.created_at.with_timezone(&Utc);
                    query.since().is_none_or(|s| created >= s)
                        && query.until().is_none_or(|u| created <= u)
                })
                .filter_map(|p| {
                    state.users.get(&p.user_id).map(|u| FeedRow {
                        id: p.id,
                        title: p.title.clone(),
                        content: p.content.clone(),
                        user_id: p.user_id,
                        tags: p.tags.clone(),
                        version: p.version,
                        created_at: p.created_at,
                        updated_at: p.updated_at,
                        username: u.username.clone(),
                        comments_count: comment_counts.get(&p.id).copied().unwrap_or(0),
                    })
                })
                .collect();

            rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            if query.sort() == SortDirection::Desc {
                rows.reverse();
            }

            Ok(rows
                .into_iter()
                .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
                .take(query.limit() as usize)
                .collect())
        })
        .await
    }
}
