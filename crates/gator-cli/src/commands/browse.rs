use anyhow::{bail, Context, Result};

use gator_core::{
    feed::FeedFetcher,
    storage::{Database, FeedRepository, PostRepository},
};

/// Print the most recent posts, optionally from one feed
pub async fn run(db: &Database, limit: u32, feed_url: Option<&str>) -> Result<()> {
    let post_repo = PostRepository::new(db);

    let posts = match feed_url {
        Some(url) => {
            let url = FeedFetcher::normalize_url(url)
                .with_context(|| format!("'{}' is not a feed URL", url))?;
            let Some(feed) = FeedRepository::new(db).find_by_url(&url).await? else {
                bail!("No feed registered with URL {}", url);
            };
            post_repo.list_by_feed(feed.id, limit).await?
        }
        None => post_repo.list_recent(limit).await?,
    };

    if posts.is_empty() {
        println!("No posts yet. Run 'gator agg' to collect some.");
        return Ok(());
    }

    for post in &posts {
        println!("{}", post.title);
        println!("  {}", post.url);
        if let Some(published) = post.published_at {
            println!("  Published: {}", published.format("%Y-%m-%d %H:%M"));
        }
        let preview = post.description_preview(200);
        if !preview.is_empty() {
            println!("  {}", preview);
        }
        println!();
    }

    Ok(())
}
