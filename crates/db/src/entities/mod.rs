//! Database entities.

pub mod comment;
pub mod follower;
pub mod post;
pub mod user;

pub use comment::Entity as Comment;
pub use follower::Entity as Follower;
pub use post::Entity as Post;
pub use user::Entity as User;
