//! Identifier and version value types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post identifier, assigned by the store at creation.
pub type PostId = i64;

/// User identifier.
pub type UserId = i64;

/// Comment identifier.
pub type CommentId = i64;

/// Point in time used for creation/update stamps and feed windows.
pub type Timestamp = DateTime<Utc>;

/// Optimistic-concurrency counter carried by every post.
///
/// A freshly created post is at [`Version::INITIAL`]; each successful
/// content-changing update moves it to [`Version::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i32);

impl Version {
    /// Version of a post that has never been updated.
    pub const INITIAL: Self = Self(1);

    /// Wrap a raw counter value.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw counter value, as stored.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// The version a successful update produces, or `None` once the counter
    /// is exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl From<i32> for Version {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<Version> for i32 {
    fn from(value: Version) -> Self {
        value.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
