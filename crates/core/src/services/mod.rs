//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod feed;
pub mod following;
pub mod post;
pub mod user;

pub use comment::{CommentService, CreateCommentInput};
pub use feed::FeedService;
pub use following::FollowingService;
pub use post::{CreatePostInput, PostService, PostWithComments, UpdatePostInput};
pub use user::{CreateUserInput, UserService};
