use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who adds feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents a polled RSS/Atom feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new feed
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
}

/// A stored entry, unique by `url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Feed {
    /// True until the poller has recorded a first attempt
    pub fn never_fetched(&self) -> bool {
        self.last_fetched_at.is_none()
    }
}

impl Post {
    /// Get a preview of the description (first N characters)
    pub fn description_preview(&self, max_len: usize) -> String {
        let text = self.description.as_deref().unwrap_or("");

        if text.chars().count() <= max_len {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_len).collect();
            format!("{}...", truncated.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(description: Option<&str>) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::new_v4(),
            feed_id: Uuid::new_v4(),
            title: "t".to_string(),
            url: "https://example.com/t".to_string(),
            description: description.map(str::to_string),
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_description_preview() {
        assert_eq!(post(None).description_preview(10), "");
        assert_eq!(post(Some("short")).description_preview(10), "short");
        assert_eq!(post(Some("héllo wörld again")).description_preview(5), "héllo...");
    }
}
