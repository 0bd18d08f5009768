use chrono::Utc;

use super::writer::{write_posts, WriteReport};
use crate::config::FailurePolicy;
use crate::feed::{Feed, FeedSource};
use crate::storage::PollStore;
use crate::Result;

/// How a cycle went for the feed it picked
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Fetched(WriteReport),
    FetchFailed { class: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub feed: Feed,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn new_posts(&self) -> u32 {
        match &self.outcome {
            CycleOutcome::Fetched(report) => report.inserted_count(),
            CycleOutcome::FetchFailed { .. } => 0,
        }
    }
}

/// One poll cycle: pick the stalest feed, fetch it, store new posts, mark it fetched.
///
/// Returns `Ok(None)` when there are no feeds. A failed fetch is reported in the
/// outcome, not as an error; only storage failures on the feed itself are errors.
pub async fn run_cycle(
    store: &dyn PollStore,
    source: &dyn FeedSource,
    policy: FailurePolicy,
) -> Result<Option<CycleReport>> {
    let Some(feed) = store.next_feed_to_fetch().await? else {
        tracing::debug!("No feeds to fetch");
        return Ok(None);
    };

    tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");

    let outcome = match source.fetch_document(&feed.url).await {
        Ok(document) => {
            let report = write_posts(store, &feed, &document.items).await;
            store.mark_feed_fetched(feed.id, Utc::now()).await?;

            tracing::info!(
                feed = %feed.name,
                inserted = report.inserted_count(),
                already_present = report.already_present,
                failed = report.failed,
                "Feed processed"
            );
            CycleOutcome::Fetched(report)
        }
        Err(e) => {
            tracing::warn!(
                feed = %feed.name,
                url = %feed.url,
                class = e.class().as_str(),
                error = %e,
                "Failed to fetch feed"
            );

            if policy == FailurePolicy::Advance {
                store.mark_feed_fetched(feed.id, Utc::now()).await?;
            }
            CycleOutcome::FetchFailed {
                class: e.class().as_str(),
                message: e.to_string(),
            }
        }
    };

    Ok(Some(CycleReport { feed, outcome }))
}
