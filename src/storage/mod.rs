//! SQLite persistence for users, sources, follows and posts.
//!
//! `Database` is a cheap-to-clone handle over a sqlx pool; operations are
//! grouped by table in the submodules as `impl Database` blocks.

mod follows;
mod posts;
mod schema;
mod sources;
mod types;
mod users;

pub use schema::Database;
pub use types::{DatabaseError, FeedFollow, NewPost, Post, Source, SourceListing, User};
