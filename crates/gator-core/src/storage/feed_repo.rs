use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Feed, NewFeed};
use crate::{Error, Result};

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    user_id: String,
    last_fetched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            last_fetched_at: row.last_fetched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new feed
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(new_feed.user_id.to_string())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::FeedNotFound(id.to_string()))
    }

    /// Find a feed by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by URL
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE url = ?", FEED_COLUMNS))
                .bind(url)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// Get all feeds in creation order
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds ORDER BY created_at ASC, id ASC",
            FEED_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// The feed that has waited longest: never-fetched feeds first, then oldest fetch
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
            "#,
            FEED_COLUMNS
        ))
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Record a fetch at `at`. The stored timestamp never moves backwards.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < ? THEN ?
                    ELSE last_fetched_at
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FeedNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Get total feed count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UserRepository;
    use chrono::Duration;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db).create("lane").await.unwrap();
        (db, user.id)
    }

    fn new_feed(user_id: Uuid, name: &str) -> NewFeed {
        NewFeed {
            name: name.to_string(),
            url: format!("https://{}.example.com/rss", name),
            user_id,
        }
    }

    #[tokio::test]
    async fn test_create_feed() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(&db);

        let feed = repo.create(&new_feed(user_id, "hn")).await.unwrap();
        assert_eq!(feed.name, "hn");
        assert_eq!(feed.user_id, user_id);
        assert!(feed.never_fetched());

        let found = repo.find_by_url("https://hn.example.com/rss").await.unwrap().unwrap();
        assert_eq!(found.id, feed.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_is_rejected() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(&db);

        repo.create(&new_feed(user_id, "hn")).await.unwrap();
        let err = repo.create(&new_feed(user_id, "hn")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_next_to_fetch_prefers_never_fetched_then_oldest() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(&db);

        let a = repo.create(&new_feed(user_id, "a")).await.unwrap();
        let b = repo.create(&new_feed(user_id, "b")).await.unwrap();
        let c = repo.create(&new_feed(user_id, "c")).await.unwrap();

        let now = Utc::now();
        repo.mark_fetched(a.id, now - Duration::minutes(5)).await.unwrap();
        repo.mark_fetched(b.id, now - Duration::minutes(10)).await.unwrap();

        assert_eq!(repo.next_to_fetch().await.unwrap().unwrap().id, c.id);

        repo.mark_fetched(c.id, now).await.unwrap();
        assert_eq!(repo.next_to_fetch().await.unwrap().unwrap().id, b.id);
    }

    #[tokio::test]
    async fn test_next_to_fetch_empty() {
        let (db, _) = setup().await;
        assert!(FeedRepository::new(&db).next_to_fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_fetched_never_moves_backwards() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(&db);
        let feed = repo.create(&new_feed(user_id, "hn")).await.unwrap();

        let later = Utc::now();
        let earlier = later - Duration::hours(1);

        repo.mark_fetched(feed.id, later).await.unwrap();
        repo.mark_fetched(feed.id, earlier).await.unwrap();

        let stored = repo.find_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(stored.last_fetched_at, Some(later));
    }

    #[tokio::test]
    async fn test_mark_fetched_unknown_feed() {
        let (db, _) = setup().await;
        let result = FeedRepository::new(&db).mark_fetched(Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(result, Err(Error::FeedNotFound(_))));
    }
}
