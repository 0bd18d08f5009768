mod database;
mod feed_repo;
mod post_repo;
mod user_repo;

pub use database::Database;
pub use feed_repo::FeedRepository;
pub use post_repo::PostRepository;
pub use user_repo::UserRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::feed::{Feed, NewPost, Post};
use crate::Result;

/// Result of an insert-or-skip on the post link
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Post),
    /// A post with the same link already exists and was left as it was
    AlreadyPresent,
}

/// Storage operations the poller needs
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Oldest `last_fetched_at` first, never-fetched feeds before all others
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>>;

    /// Must never move `last_fetched_at` backwards
    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>>;

    /// Atomic on the link URL: safe to call with a link that is already stored
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome>;
}

#[async_trait]
impl PollStore for Database {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        FeedRepository::new(self).next_to_fetch().await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        FeedRepository::new(self).mark_fetched(feed_id, at).await
    }

    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        PostRepository::new(self).find_by_url(url).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome> {
        Ok(match PostRepository::new(self).insert_if_absent(post).await? {
            Some(post) => InsertOutcome::Inserted(post),
            None => InsertOutcome::AlreadyPresent,
        })
    }
}
