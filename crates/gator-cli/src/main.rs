use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "gator")]
#[command(author, version, about = "A feed aggregator that polls RSS and Atom feeds")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user and log in as it
    Register {
        name: String,
    },
    /// Switch to an existing user
    Login {
        name: String,
    },
    /// List users, marking the current one
    Users,
    /// Delete all users, feeds and posts
    Reset,
    /// Add a feed owned by the current user
    Addfeed {
        /// Display name for the feed
        name: String,
        /// Feed URL (http or https)
        url: String,
    },
    /// List all feeds
    Feeds,
    /// Poll feeds on an interval until Ctrl+C
    Agg {
        /// Time between polls, e.g. 30s, 5m, 1h30m
        #[arg(value_parser = commands::agg::parse_interval)]
        interval: Option<Duration>,
    },
    /// Show the most recent posts
    Browse {
        /// Number of posts to show
        #[arg(short, long, default_value_t = 2)]
        limit: u32,
        /// Only show posts from the feed with this URL
        #[arg(short, long)]
        feed: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Arc::new(Database::new(&config).await?);

    match cli.command {
        Commands::Register { name } => {
            commands::users::register(&db, &mut config, &config_path, &name).await
        }
        Commands::Login { name } => {
            commands::users::login(&db, &mut config, &config_path, &name).await
        }
        Commands::Users => {
            commands::users::list(&db, &config).await
        }
        Commands::Reset => {
            commands::users::reset(&db, &mut config, &config_path).await
        }
        Commands::Addfeed { name, url } => {
            commands::feeds::add(&db, &config, &name, &url).await
        }
        Commands::Feeds => {
            commands::feeds::list(&db).await
        }
        Commands::Agg { interval } => {
            commands::agg::run(db, &config, interval).await
        }
        Commands::Browse { limit, feed } => {
            commands::browse::run(&db, limit, feed.as_deref()).await
        }
    }
}
