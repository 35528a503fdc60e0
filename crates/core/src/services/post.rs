//! Post service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use social_common::{AppError, AppResult, MAX_OFFSET, PostId, UserId, Version};
use social_db::entities::post;
use social_db::repositories::{
    CommentRepository, CommentWithAuthor, NewPost, PostChange, PostRepository, UserRepository,
};
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// Most tags a single post may carry.
pub const MAX_TAGS: usize = 16;

/// Input for creating a new post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 100))]
    pub title: String,

    #[validate(length(min = 1, max = 1000))]
    pub content: String,

    #[validate(length(max = 16))]
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for a versioned post update.
///
/// `version` is the version the caller last read; the update only lands if
/// the post is still at that version.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePostInput {
    pub version: i32,

    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 1000))]
    pub content: Option<String>,
}

/// A post together with its comments, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: post::Model,
    pub comments: Vec<CommentWithAuthor>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserRepository>,
    max_limit: u64,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserRepository>,
        max_limit: u64,
    ) -> Self {
        Self {
            posts,
            comments,
            users,
            max_limit,
        }
    }

    /// Create a post authored by `author_id`.
    pub async fn create(
        &self,
        author_id: UserId,
        input: CreatePostInput,
        cancel: &CancellationToken,
    ) -> AppResult<post::Model> {
        input.validate()?;
        let tags = normalize_tags(input.tags);

        self.users.get_by_id(author_id, cancel).await?;

        let post = self
            .posts
            .create(
                NewPost {
                    user_id: author_id,
                    title: input.title,
                    content: input.content,
                    tags,
                },
                cancel,
            )
            .await?;

        tracing::info!(post_id = post.id, user_id = author_id, "post created");
        Ok(post)
    }

    /// Get a post with its comments.
    pub async fn get(&self, id: PostId, cancel: &CancellationToken) -> AppResult<PostWithComments> {
        let post = self.posts.get_by_id(id, cancel).await?;
        let comments = self.comments.list_by_post(id, cancel).await?;
        Ok(PostWithComments { post, comments })
    }

    /// Apply a versioned update.
    ///
    /// Exactly one of several concurrent updates that read the same version
    /// succeeds; the others fail with [`AppError::Conflict`] and must re-read.
    pub async fn update(
        &self,
        id: PostId,
        input: UpdatePostInput,
        cancel: &CancellationToken,
    ) -> AppResult<post::Model> {
        input.validate()?;

        let change = PostChange {
            id,
            expected_version: Version::new(input.version),
            title: input.title,
            content: input.content,
        };
        if change.is_empty() {
            return Err(AppError::validation(
                "title",
                "either title or content must be provided",
            ));
        }

        match self.posts.update(change, cancel).await {
            Ok(post) => {
                tracing::info!(post_id = id, version = post.version, "post updated");
                Ok(post)
            }
            Err(e @ AppError::Conflict(_)) => {
                tracing::info!(
                    post_id = id,
                    expected_version = input.version,
                    "post update conflict"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a post and, through the store, its comments.
    pub async fn delete(&self, id: PostId, cancel: &CancellationToken) -> AppResult<()> {
        self.posts.delete_by_id(id, cancel).await?;
        tracing::info!(post_id = id, "post deleted");
        Ok(())
    }

    /// List posts by id, oldest first. The page size is capped at the
    /// configured feed maximum.
    pub async fn list(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<post::Model>> {
        let limit = match limit {
            Some(0) => return Err(AppError::validation("limit", "must be positive")),
            Some(limit) => limit.min(self.max_limit),
            None => self.max_limit,
        };
        let offset = offset.unwrap_or(0);
        if offset > MAX_OFFSET {
            return Err(AppError::validation(
                "offset",
                format!("must not be above {MAX_OFFSET}"),
            ));
        }
        self.posts.list(limit, offset, cancel).await
    }
}

/// Trim tags, dropping blanks and repeats while keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len().min(MAX_TAGS));
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use social_db::MemoryStore;
    use social_db::repositories::NewUser;

    async fn setup() -> (PostService, UserId) {
        let store = Arc::new(MemoryStore::new());
        let author = UserRepository::create(
            store.as_ref(),
            NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .id;
        let service = PostService::new(store.clone(), store.clone(), store, 100);
        (service, author)
    }

    fn create_input(title: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: "body".to_string(),
            tags: vec![" rust ".to_string(), "rust".to_string(), String::new()],
        }
    }

    fn title_update(version: i32, title: &str) -> UpdatePostInput {
        UpdatePostInput {
            version,
            title: Some(title.to_string()),
            content: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_at_version_one_with_clean_tags() {
        let (service, author) = setup().await;
        let post = service
            .create(author, create_input("A"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(post.version(), Version::INITIAL);
        assert_eq!(post.tags, vec!["rust".to_string()]);
        assert_eq!(post.user_id, author);
    }

    #[tokio::test]
    async fn test_create_rejects_long_title() {
        let (service, author) = setup().await;
        let err = service
            .create(author, create_input(&"x".repeat(101)), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "title"));
    }

    #[tokio::test]
    async fn test_create_for_unknown_author() {
        let (service, _) = setup().await;
        let err = service
            .create(999, create_input("A"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UserNotFound(999)));
    }

    #[tokio::test]
    async fn test_update_applies_change_and_bumps_version() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        let post = service.create(author, create_input("A"), &cancel).await.unwrap();

        let updated = service
            .update(post.id, title_update(1, "B"), &cancel)
            .await
            .unwrap();
        assert_eq!(updated.version(), Version::new(2));

        let read = service.get(post.id, &cancel).await.unwrap();
        assert_eq!(read.post.title, "B");
        assert_eq!(read.post.content, "body");
        assert_eq!(read.post.version(), Version::new(2));
    }

    #[tokio::test]
    async fn test_stale_update_is_conflict() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        let post = service.create(author, create_input("A"), &cancel).await.unwrap();
        service
            .update(post.id, title_update(1, "B"), &cancel)
            .await
            .unwrap();

        let err = service
            .update(post.id, title_update(1, "C"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let read = service.get(post.id, &cancel).await.unwrap();
        assert_eq!(read.post.title, "B");
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        let post = service.create(author, create_input("A"), &cancel).await.unwrap();

        let err = service
            .update(
                post.id,
                UpdatePostInput {
                    version: 1,
                    title: None,
                    content: None,
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let (service, _) = setup().await;
        let err = service
            .update(404, title_update(1, "B"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PostNotFound(404)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_racers_exactly_one_wins() {
        for start_version in [1, 2, 5] {
            for racers in [2_usize, 3, 8] {
                let (service, author) = setup().await;
                let cancel = CancellationToken::new();
                let post_id = service
                    .create(author, create_input("A"), &cancel)
                    .await
                    .unwrap()
                    .id;
                for v in 1..start_version {
                    service
                        .update(post_id, title_update(v, &format!("v{}", v + 1)), &cancel)
                        .await
                        .unwrap();
                }

                let handles: Vec<_> = (0..racers)
                    .map(|n| {
                        let service = service.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            service
                                .update(
                                    post_id,
                                    title_update(start_version, &format!("racer {n}")),
                                    &cancel,
                                )
                                .await
                        })
                    })
                    .collect();
                let outcomes: Vec<_> = futures::future::join_all(handles)
                    .await
                    .into_iter()
                    .map(Result::unwrap)
                    .collect();

                let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
                let conflicts = outcomes
                    .iter()
                    .filter(|r| matches!(r, Err(AppError::Conflict(_))))
                    .count();
                assert_eq!(winners.len(), 1, "N={start_version}, racers={racers}");
                assert_eq!(conflicts, racers - 1);
                assert_eq!(winners[0].version, start_version + 1);

                let read = service.get(post_id, &cancel).await.unwrap();
                assert_eq!(read.post.version, start_version + 1);
                assert_eq!(read.post.title, winners[0].title);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_title_and_content_racers_never_merge() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        let post_id = service
            .create(author, create_input("A"), &cancel)
            .await
            .unwrap()
            .id;

        let title_racer = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                service
                    .update(post_id, title_update(1, "B"), &cancel)
                    .await
            })
        };
        let content_racer = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                service
                    .update(
                        post_id,
                        UpdatePostInput {
                            version: 1,
                            title: None,
                            content: Some("C".to_string()),
                        },
                        &cancel,
                    )
                    .await
            })
        };

        let (a, b) = (title_racer.await.unwrap(), content_racer.await.unwrap());
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(
            matches!(a, Err(AppError::Conflict(_))) || matches!(b, Err(AppError::Conflict(_)))
        );

        let read = service.get(post_id, &cancel).await.unwrap().post;
        assert_eq!(read.version, 2);
        assert!((read.title == "B") ^ (read.content == "C"));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        let post = service.create(author, create_input("A"), &cancel).await.unwrap();

        service.delete(post.id, &cancel).await.unwrap();

        assert!(matches!(
            service.get(post.id, &cancel).await.unwrap_err(),
            AppError::PostNotFound(_)
        ));
        assert!(matches!(
            service.delete(post.id, &cancel).await.unwrap_err(),
            AppError::PostNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_caps_page_size() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        for n in 0..3 {
            service
                .create(author, create_input(&format!("post {n}")), &cancel)
                .await
                .unwrap();
        }

        let page = service.list(Some(2), Some(1), &cancel).await.unwrap();
        assert_eq!(
            page.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
            ["post 1", "post 2"]
        );
        assert!(service.list(Some(0), None, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_list_rejects_offset_beyond_signed_range() {
        let (service, _) = setup().await;
        let cancel = CancellationToken::new();

        let err = service
            .list(None, Some(MAX_OFFSET + 1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "offset"));

        assert!(service.list(None, Some(MAX_OFFSET), &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_does_not_write() {
        let (service, author) = setup().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service
            .create(author, create_input("A"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));

        let page = service
            .list(None, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(page.is_empty());
    }
}
