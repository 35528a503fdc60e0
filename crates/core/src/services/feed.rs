//! Feed service.

use std::sync::Arc;

use social_common::{AppResult, FeedParams, FeedQueryBuilder, UserId};
use social_db::repositories::{FeedAggregator, FeedRow};
use tokio_util::sync::CancellationToken;

/// Feed service: validates raw parameters, then runs the aggregate query.
#[derive(Clone)]
pub struct FeedService {
    aggregator: Arc<dyn FeedAggregator>,
    builder: FeedQueryBuilder,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub fn new(aggregator: Arc<dyn FeedAggregator>, builder: FeedQueryBuilder) -> Self {
        Self {
            aggregator,
            builder,
        }
    }

    /// The requester's feed page.
    ///
    /// Parameters are validated in full before the store is touched.
    pub async fn get_feed(
        &self,
        requester: UserId,
        params: &FeedParams,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<FeedRow>> {
        let query = self.builder.build(params)?;
        let rows = self.aggregator.feed(requester, &query, cancel).await?;

        tracing::debug!(
            user_id = requester,
            rows = rows.len(),
            limit = query.limit(),
            offset = query.offset(),
            "feed served"
        );
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use social_common::AppError;
    use social_db::MemoryStore;
    use social_db::entities::{post, user};
    use social_db::repositories::FollowerGraph;
    use std::collections::BTreeSet;

    fn member(id: i64, name: &str) -> user::Model {
        user::Model {
            id,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            created_at: Utc::now().into(),
        }
    }

    fn post_at(id: i64, user_id: i64, minutes: i64, tags: &[&str]) -> post::Model {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        post::Model {
            id,
            title: format!("post {id}"),
            content: format!("written by {user_id}"),
            user_id,
            tags: tags.iter().map(ToString::to_string).collect(),
            created_at: at.into(),
            updated_at: at.into(),
            version: 1,
        }
    }

    /// Users 1..=4; user 1 follows 2 and 3. Posts 10.. spread over time,
    /// two of them sharing a timestamp to exercise the id tie-break.
    async fn seeded() -> (FeedService, MemoryStore) {
        let store = MemoryStore::new();
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol"), (4, "dave")] {
            store.insert_user(member(id, name)).await;
        }
        let cancel = CancellationToken::new();
        store.follow(2, 1, &cancel).await.unwrap();
        store.follow(3, 1, &cancel).await.unwrap();

        let posts = [
            post_at(10, 1, 0, &["rust"]),
            post_at(11, 2, 5, &["go"]),
            post_at(12, 3, 5, &["rust", "db"]),
            post_at(13, 4, 6, &["rust"]),
            post_at(14, 2, 10, &[]),
            post_at(15, 1, 20, &["db"]),
            post_at(16, 4, 30, &[]),
            post_at(17, 3, 40, &["go"]),
        ];
        for post in posts {
            store.insert_post(post).await;
        }

        let service = FeedService::new(Arc::new(store.clone()), FeedQueryBuilder::default());
        (service, store)
    }

    fn params() -> FeedParams {
        FeedParams::default()
    }

    fn ids(rows: &[FeedRow]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_scope_is_own_plus_followed() {
        let (service, _) = seeded().await;
        let rows = service
            .get_feed(1, &params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![17, 15, 14, 12, 11, 10]);
        assert!(rows.iter().all(|r| r.user_id != 4));
    }

    #[tokio::test]
    async fn test_unfollowed_author_leaves_feed() {
        let (service, store) = seeded().await;
        let cancel = CancellationToken::new();
        store.unfollow(3, 1, &cancel).await.unwrap();

        let rows = service.get_feed(1, &params(), &cancel).await.unwrap();
        assert_eq!(ids(&rows), vec![15, 14, 11, 10]);
    }

    #[tokio::test]
    async fn test_ties_broken_by_id_in_sort_direction() {
        let (service, _) = seeded().await;
        let cancel = CancellationToken::new();

        let asc = service
            .get_feed(
                1,
                &FeedParams {
                    sort: Some("asc".to_string()),
                    ..params()
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(ids(&asc), vec![10, 11, 12, 14, 15, 17]);

        let desc = service.get_feed(1, &params(), &cancel).await.unwrap();
        let pos = |id: i64| ids(&desc).iter().position(|&x| x == id).unwrap();
        assert!(pos(12) < pos(11));
    }

    #[tokio::test]
    async fn test_pages_partition_the_feed() {
        let (service, _) = seeded().await;
        let cancel = CancellationToken::new();
        let full = ids(&service.get_feed(1, &params(), &cancel).await.unwrap());

        for limit in [1_usize, 2, 4] {
            let mut seen = Vec::new();
            let mut offset = 0;
            loop {
                let page = service
                    .get_feed(
                        1,
                        &FeedParams {
                            limit: Some(limit.to_string()),
                            offset: Some(offset.to_string()),
                            ..params()
                        },
                        &cancel,
                    )
                    .await
                    .unwrap();
                assert!(page.len() <= limit);
                if page.is_empty() {
                    break;
                }
                seen.extend(ids(&page));
                offset += limit;
            }
            assert_eq!(seen, full, "limit={limit}");
            assert_eq!(seen.iter().collect::<BTreeSet<_>>().len(), seen.len());
        }
    }

    #[tokio::test]
    async fn test_tag_filter_needs_any_overlap() {
        let (service, _) = seeded().await;
        let rows = service
            .get_feed(
                1,
                &FeedParams {
                    tags: Some("db,go".to_string()),
                    ..params()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![17, 15, 12, 11]);
    }

    #[tokio::test]
    async fn test_time_window_is_inclusive() {
        let (service, _) = seeded().await;
        let rows = service
            .get_feed(
                1,
                &FeedParams {
                    since: Some("2024-06-01 00:05:00".to_string()),
                    until: Some("2024-06-01T00:20:00Z".to_string()),
                    ..params()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![15, 14, 12, 11]);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_content() {
        let (service, _) = seeded().await;
        let rows = service
            .get_feed(
                1,
                &FeedParams {
                    search: Some("WRITTEN BY 3".to_string()),
                    ..params()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![17, 12]);
    }

    #[tokio::test]
    async fn test_empty_feed_is_not_an_error() {
        let (service, _) = seeded().await;
        let rows = service
            .get_feed(
                1,
                &FeedParams {
                    tags: Some("haskell".to_string()),
                    ..params()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_before_store() {
        // A store slower than any test would tolerate: validation must fail first.
        let store = MemoryStore::new().with_latency(std::time::Duration::from_secs(3600));
        let service = FeedService::new(Arc::new(store), FeedQueryBuilder::default());
        let cancel = CancellationToken::new();

        for bad in [
            FeedParams {
                limit: Some("0".to_string()),
                ..params()
            },
            FeedParams {
                limit: Some("-3".to_string()),
                ..params()
            },
            FeedParams {
                sort: Some("sideways".to_string()),
                ..params()
            },
            FeedParams {
                since: Some("2024-06-02T00:00:00Z".to_string()),
                until: Some("2024-06-01T00:00:00Z".to_string()),
                ..params()
            },
        ] {
            let err = service.get_feed(1, &bad, &cancel).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let store = MemoryStore::new()
            .with_guard(social_db::QueryGuard::new(std::time::Duration::from_secs(5)))
            .with_latency(std::time::Duration::from_secs(6));
        let service = FeedService::new(Arc::new(store), FeedQueryBuilder::default());

        let err = service
            .get_feed(1, &params(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
