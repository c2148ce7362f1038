mod core;
mod feed;
mod follow;
mod post;
mod schema;
mod user;

pub use self::core::Database;
pub use self::feed::Feed;
pub use self::follow::FollowedFeed;
pub use self::post::{NewPost, Post, PostWrite};
pub use self::user::User;
