//! Common utilities and shared types for social-rs.
//!
//! This crate provides foundational components used across all social-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Identifiers**: Post/user ids and the optimistic-concurrency [`Version`]
//! - **Feed queries**: Validation of raw feed parameters via [`FeedQueryBuilder`]
//!
//! # Example
//!
//! ```no_run
//! use social_common::{AppResult, Config, FeedParams, FeedQueryBuilder};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let builder = FeedQueryBuilder::from_config(&config.feed);
//!     let query = builder.build(&FeedParams::default())?;
//!     println!("page size: {}", query.limit());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod feed_query;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use feed_query::{FeedParams, FeedQuery, FeedQueryBuilder, MAX_OFFSET, SortDirection};
pub use id::{CommentId, PostId, Timestamp, UserId, Version};
