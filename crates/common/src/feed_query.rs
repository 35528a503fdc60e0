//! Feed query parameters.
//!
//! Raw, untrusted request parameters ([`FeedParams`]) are turned into a
//! validated [`FeedQuery`] by a [`FeedQueryBuilder`]. A `FeedQuery` can only
//! be obtained through the builder, so anything holding one holds a fully
//! validated, bounded descriptor.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};
use crate::id::Timestamp;

/// Longest free-text search term accepted.
pub const MAX_SEARCH_LEN: usize = 100;

/// Largest offset accepted; the store binds offsets as signed 64-bit values.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Ordering of feed rows by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Raw feed parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedParams {
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
}

/// Validated feed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    limit: u64,
    offset: u64,
    sort: SortDirection,
    tags: Vec<String>,
    search: Option<String>,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
}

impl FeedQuery {
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn sort(&self) -> SortDirection {
        self.sort
    }

    /// Requested tags; empty when the feed is not tag-filtered.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    #[must_use]
    pub const fn since(&self) -> Option<Timestamp> {
        self.since
    }

    #[must_use]
    pub const fn until(&self) -> Option<Timestamp> {
        self.until
    }
}

/// Builds [`FeedQuery`] values from raw parameters, applying defaults and bounds.
#[derive(Debug, Clone, Copy)]
pub struct FeedQueryBuilder {
    default_limit: u64,
    max_limit: u64,
}

impl Default for FeedQueryBuilder {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}

impl FeedQueryBuilder {
    /// Create a builder with explicit bounds.
    #[must_use]
    pub const fn new(default_limit: u64, max_limit: u64) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Create a builder from the feed section of the configuration.
    #[must_use]
    pub const fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.default_limit, config.max_limit)
    }

    /// Largest page size this builder accepts.
    #[must_use]
    pub const fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// Validate raw parameters into a descriptor.
    ///
    /// Fails on the first offending field; no partially valid descriptor is
    /// ever produced.
    pub fn build(&self, params: &FeedParams) -> AppResult<FeedQuery> {
        let limit = match present(params.limit.as_deref()) {
            Some(raw) => self.parse_limit(raw)?,
            None => self.default_limit.min(self.max_limit),
        };

        let offset = match present(params.offset.as_deref()) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|offset| *offset <= MAX_OFFSET)
                .ok_or_else(|| {
                    AppError::validation(
                        "offset",
                        format!("must be a non-negative integer not above {MAX_OFFSET}"),
                    )
                })?,
            None => 0,
        };

        let sort = match present(params.sort.as_deref()) {
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(_) => return Err(AppError::validation("sort", "must be \"asc\" or \"desc\"")),
            None => SortDirection::Desc,
        };

        let since = present(params.since.as_deref())
            .map(|raw| parse_timestamp("since", raw))
            .transpose()?;
        let until = present(params.until.as_deref())
            .map(|raw| parse_timestamp("until", raw))
            .transpose()?;
        if let (Some(since), Some(until)) = (since, until)
            && since > until
        {
            return Err(AppError::validation("since", "must not be later than until"));
        }

        let tags = match params.tags.as_deref() {
            Some(raw) => parse_tags(raw)?,
            None => Vec::new(),
        };

        let search = match present(params.search.as_deref()) {
            Some(term) if term.chars().count() > MAX_SEARCH_LEN => {
                return Err(AppError::validation(
                    "search",
                    format!("must be at most {MAX_SEARCH_LEN} characters"),
                ));
            }
            Some(term) => Some(term.to_string()),
            None => None,
        };

        Ok(FeedQuery {
            limit,
            offset,
            sort,
            tags,
            search,
            since,
            until,
        })
    }

    fn parse_limit(&self, raw: &str) -> AppResult<u64> {
        let limit = raw
            .parse::<i64>()
            .map_err(|_| AppError::validation("limit", "must be an integer"))?;
        if limit <= 0 {
            return Err(AppError::validation("limit", "must be positive"));
        }
        let limit = limit as u64;
        if limit > self.max_limit {
            return Err(AppError::validation(
                "limit",
                format!("must not exceed {}", self.max_limit),
            ));
        }
        Ok(limit)
    }
}

/// Treat missing and blank parameters alike.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_timestamp(field: &str, raw: &str) -> AppResult<Timestamp> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            AppError::validation(
                field,
                "must be an RFC 3339 timestamp or YYYY-MM-DD HH:MM:SS",
            )
        })
}

fn parse_tags(raw: &str) -> AppResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.is_empty() {
        return Err(AppError::validation("tags", "must contain at least one tag"));
    }
    Ok(tags)
}
