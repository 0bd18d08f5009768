use tracing::{debug, warn};

use crate::feed::{parse_timestamp, Feed, FeedItem, NewPost, Post};
use crate::storage::{InsertOutcome, PollStore};

/// What happened to the items of one document
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub inserted: Vec<Post>,
    /// Items whose link was already stored
    pub already_present: u32,
    /// Items without a link
    pub invalid: u32,
    /// Items whose lookup or insert failed
    pub failed: u32,
}

impl WriteReport {
    pub fn inserted_count(&self) -> u32 {
        self.inserted.len() as u32
    }
}

fn to_new_post(feed: &Feed, item: &FeedItem, link: &str) -> NewPost {
    let published_at = parse_timestamp(&item.pub_date);
    if published_at.is_none() && !item.pub_date.trim().is_empty() {
        debug!(
            url = link,
            pub_date = %item.pub_date,
            "Published time could not be parsed, storing without it"
        );
    }

    let description = item.description.trim();

    NewPost {
        feed_id: feed.id,
        title: item.title.clone(),
        url: link.to_string(),
        description: (!description.is_empty()).then(|| description.to_string()),
        published_at,
    }
}

/// Store the items of `feed` that are not stored yet, in document order.
/// A failing item is logged and counted; the rest of the batch still runs.
pub async fn write_posts(store: &dyn PollStore, feed: &Feed, items: &[FeedItem]) -> WriteReport {
    let mut report = WriteReport::default();

    for item in items {
        let link = item.link.trim();
        if link.is_empty() {
            debug!(feed = %feed.name, title = %item.title, "Skipping item without a link");
            report.invalid += 1;
            continue;
        }

        match store.find_post_by_url(link).await {
            Ok(Some(_)) => {
                report.already_present += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(feed = %feed.name, url = link, error = %e, "Failed to look up post");
                report.failed += 1;
                continue;
            }
        }

        match store.insert_post(&to_new_post(feed, item, link)).await {
            Ok(InsertOutcome::Inserted(post)) => {
                debug!(feed = %feed.name, title = %post.title, "Post saved");
                report.inserted.push(post);
            }
            Ok(InsertOutcome::AlreadyPresent) => report.already_present += 1,
            Err(e) => {
                warn!(feed = %feed.name, url = link, error = %e, "Failed to save post");
                report.failed += 1;
            }
        }
    }

    report
}
