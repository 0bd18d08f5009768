use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use gator_core::{
    feed::{FeedFetcher, NewFeed},
    storage::{Database, FeedRepository, UserRepository},
    AppConfig, Error,
};

/// Add a feed owned by the current user
pub async fn add(db: &Database, config: &AppConfig, name: &str, url: &str) -> Result<()> {
    let Some(user_name) = config.general.current_user.as_deref() else {
        bail!("No current user. Run 'gator register <name>' or 'gator login <name>' first.");
    };
    let user = UserRepository::new(db)
        .find_by_name(user_name)
        .await?
        .ok_or_else(|| Error::UserNotFound(user_name.to_string()))?;

    let url = FeedFetcher::normalize_url(url)
        .with_context(|| format!("'{}' is not a feed URL", url))?;

    let feed_repo = FeedRepository::new(db);
    if feed_repo.find_by_url(&url).await?.is_some() {
        println!("A feed with this URL is already registered.");
        return Ok(());
    }

    let feed = feed_repo
        .create(&NewFeed {
            name: name.to_string(),
            url,
            user_id: user.id,
        })
        .await?;

    println!("Added feed: {} ({})", feed.name, feed.id);
    println!("  URL: {}", feed.url);
    println!("  Owner: {}", user.name);
    Ok(())
}

/// List every feed with its owner and last fetch time
pub async fn list(db: &Database) -> Result<()> {
    let feeds = FeedRepository::new(db).list_all().await?;

    if feeds.is_empty() {
        println!("No feeds yet.");
        println!("\nTo add a feed, run:");
        println!("  gator addfeed <name> <url>");
        return Ok(());
    }

    let user_repo = UserRepository::new(db);
    let mut owners = HashMap::new();

    println!("Feeds ({}):\n", feeds.len());

    for feed in &feeds {
        if !owners.contains_key(&feed.user_id) {
            let owner = user_repo
                .find_by_id(feed.user_id)
                .await?
                .map(|u| u.name)
                .unwrap_or_else(|| "(unknown)".to_string());
            owners.insert(feed.user_id, owner);
        }

        println!("  {}", feed.name);
        println!("    URL: {}", feed.url);
        if let Some(owner) = owners.get(&feed.user_id) {
            println!("    Owner: {}", owner);
        }
        match feed.last_fetched_at {
            Some(last) => println!("    Last fetched: {}", last.format("%Y-%m-%d %H:%M")),
            None => println!("    Last fetched: never"),
        }
        println!();
    }

    Ok(())
}
