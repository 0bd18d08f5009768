mod fetcher;
mod models;
mod parser;
pub mod timestamp;

pub use fetcher::{FeedFetcher, FeedSource};
pub use models::{Feed, NewFeed, NewPost, Post, User};
pub use parser::{parse_feed, FeedDocument, FeedItem};
pub use timestamp::parse_timestamp;
