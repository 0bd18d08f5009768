use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{NewPost, Post};
use crate::Result;

/// Repository for post operations
pub struct PostRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    url: String,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed_id: Uuid::parse_str(&row.feed_id).unwrap_or_default(),
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const POST_COLUMNS: &str =
    "id, feed_id, title, url, description, published_at, created_at, updated_at";

impl<'a> PostRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a post unless one with the same URL exists.
    /// Returns `None` when the URL was already stored; the existing row is left untouched.
    pub async fn insert_if_absent(&self, new_post: &NewPost) -> Result<Option<Post>> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(new_post.feed_id.to_string())
        .bind(&new_post.title)
        .bind(&new_post.url)
        .bind(&new_post.description)
        .bind(new_post.published_at)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Post::from))
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {} FROM posts WHERE url = ?", POST_COLUMNS))
                .bind(url)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Post::from))
    }

    /// Most recent posts across all feeds; undated posts sort after dated ones
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM posts
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Get posts for a feed, newest first
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: u32) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(feed_id.to_string())
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewFeed;
    use crate::storage::{FeedRepository, UserRepository};
    use chrono::Duration;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db).create("lane").await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "blog".to_string(),
                url: "https://blog.example.com/rss".to_string(),
                user_id: user.id,
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    fn new_post(feed_id: Uuid, slug: &str) -> NewPost {
        NewPost {
            feed_id,
            title: slug.to_string(),
            url: format!("https://blog.example.com/{}", slug),
            description: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_skips_existing_url() {
        let (db, feed_id) = setup().await;
        let repo = PostRepository::new(&db);

        let first = repo.insert_if_absent(&new_post(feed_id, "one")).await.unwrap().unwrap();

        let mut retitled = new_post(feed_id, "one");
        retitled.title = "changed".to_string();
        assert!(repo.insert_if_absent(&retitled).await.unwrap().is_none());

        let stored = repo.find_by_url(&first.url).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.title, "one");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_requires_existing_feed() {
        let (db, _) = setup().await;
        let result = PostRepository::new(&db)
            .insert_if_absent(&new_post(Uuid::new_v4(), "orphan"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_recent_orders_by_published_time() {
        let (db, feed_id) = setup().await;
        let repo = PostRepository::new(&db);
        let now = Utc::now();

        let mut old = new_post(feed_id, "old");
        old.published_at = Some(now - Duration::days(2));
        let mut new = new_post(feed_id, "new");
        new.published_at = Some(now);
        let undated = new_post(feed_id, "undated");

        for post in [&old, &undated, &new] {
            repo.insert_if_absent(post).await.unwrap();
        }

        let titles: Vec<String> = repo
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["new", "old", "undated"]);

        assert_eq!(repo.list_by_feed(feed_id, 2).await.unwrap().len(), 2);
    }
}
