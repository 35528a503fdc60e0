//! Feed aggregation.
//!
//! The whole feed page is produced by one statement: posts by the requester
//! or by users they follow, joined with the author's username and counted
//! against their comments.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement, Value};
use social_common::{AppResult, FeedQuery, UserId};
use tokio_util::sync::CancellationToken;

use super::{FeedAggregator, FeedRow};
use crate::guard::QueryGuard;

/// `PostgreSQL`-backed [`FeedAggregator`].
#[derive(Clone)]
pub struct PgFeedAggregator {
    db: Arc<DatabaseConnection>,
    guard: QueryGuard,
}

impl PgFeedAggregator {
    /// Create a new feed aggregator.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, guard: QueryGuard) -> Self {
        Self { db, guard }
    }
}

#[async_trait]
impl FeedAggregator for PgFeedAggregator {
    async fn feed(
        &self,
        requester: UserId,
        query: &FeedQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<FeedRow>> {
        let stmt = feed_statement(requester, query);

        self.guard
            .run(cancel, async {
                FeedRow::find_by_statement(stmt)
                    .all(self.db.as_ref())
                    .await
                    .map_err(|e| self.guard.classify(e))
            })
            .await
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Build the feed statement. Every caller-supplied value is bound, never
/// spliced; only the validated sort keyword is formatted into the text.
pub(crate) fn feed_statement(requester: UserId, query: &FeedQuery) -> Statement {
    let mut values: Vec<Value> = vec![requester.into()];
    let mut conditions = vec![
        "(p.user_id = $1 OR EXISTS (SELECT 1 FROM followers f \
         WHERE f.user_id = p.user_id AND f.follower_id = $1))"
            .to_string(),
    ];

    if !query.tags().is_empty() {
        values.push(query.tags().to_vec().into());
        conditions.push(format!("p.tags && ${}", values.len()));
    }
    if let Some(term) = query.search() {
        values.push(format!("%{}%", escape_like(term)).into());
        let n = values.len();
        conditions.push(format!("(p.title ILIKE ${n} OR p.content ILIKE ${n})"));
    }
    if let Some(since) = query.since() {
        values.push(since.into());
        conditions.push(format!("p.created_at >= ${}", values.len()));
    }
    if let Some(until) = query.until() {
        values.push(until.into());
        conditions.push(format!("p.created_at <= ${}", values.len()));
    }

    values.push(i64::try_from(query.limit()).unwrap_or(i64::MAX).into());
    let limit_param = values.len();
    values.push(i64::try_from(query.offset()).unwrap_or(i64::MAX).into());
    let offset_param = values.len();

    let dir = query.sort().as_sql();
    let sql = format!(
        "SELECT p.id, p.title, p.content, p.user_id, p.tags, p.version, \
         p.created_at, p.updated_at, u.username, COUNT(c.id) AS comments_count \
         FROM posts p \
         JOIN users u ON u.id = p.user_id \
         LEFT JOIN comments c ON c.post_id = p.id \
         WHERE {} \
         GROUP BY p.id, u.username \
         ORDER BY p.created_at {dir}, p.id {dir} \
         LIMIT ${limit_param} OFFSET ${offset_param}",
        conditions.join(" AND "),
    );

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}
