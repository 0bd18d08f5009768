use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::info;

use gator_core::{
    feed::FeedFetcher,
    scheduler::{PollScheduler, SchedulerEvent},
    storage::{Database, FeedRepository},
    AppConfig,
};

/// Parse an interval such as `30s`, `5m`, `1h30m` or `1.5h`
pub fn parse_interval(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("interval must not be empty".to_string());
    }

    let mut total = 0.0_f64;
    let mut rest = input;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, after) = rest.split_at(number_len);
        if number.is_empty() {
            return Err(format!("expected a number in '{}'", input));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number '{}' in '{}'", number, input))?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);
        let seconds = match unit {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            "" => return Err(format!("missing unit in '{}' (use h, m, s or ms)", input)),
            other => return Err(format!("unknown unit '{}' in '{}'", other, input)),
        };

        total += value * seconds;
        rest = after;
    }

    let interval = Duration::try_from_secs_f64(total)
        .map_err(|_| format!("interval '{}' is out of range", input))?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

/// Poll feeds until Ctrl+C
pub async fn run(db: Arc<Database>, config: &AppConfig, interval: Option<Duration>) -> Result<()> {
    let interval = interval.unwrap_or_else(|| config.sync.poll_interval());
    let fetcher = Arc::new(FeedFetcher::new(config)?);
    let feed_count = FeedRepository::new(&db).count().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SchedulerEvent::FeedFetched { feed, new_posts } => {
                    println!("{}: {} new posts", feed, new_posts);
                }
                SchedulerEvent::FetchFailed { feed, class, message } => {
                    println!("{}: {} error: {}", feed, class, message);
                }
                SchedulerEvent::NoFeeds => {}
                SchedulerEvent::Error { message } => println!("Poll cycle failed: {}", message),
            }
        }
    });

    let scheduler = PollScheduler::new(db, fetcher, interval, config.sync.on_fetch_failure)
        .with_event_sender(event_tx);

    println!(
        "Collecting {} feeds every {:?}. Press Ctrl+C to stop.",
        feed_count, interval
    );

    // Blocks until shutdown
    scheduler.run(shutdown_rx).await;

    println!("Stopped collecting.");
    Ok(())
}
