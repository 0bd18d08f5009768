use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, ClientBuilder, Proxy};
use url::Url;

use super::parser::{parse_feed, FeedDocument};
use crate::config::{AppConfig, SyncConfig};
use crate::{Error, Result};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";
const MAX_REDIRECTS: usize = 10;

/// Anything that can turn a feed URL into a parsed document
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<FeedDocument>;
}

/// Feed fetcher with a shared HTTP client
pub struct FeedFetcher {
    client: Client,
    max_feed_bytes: usize,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::client_builder(&config.sync)?
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_bytes: config.sync.max_feed_bytes,
        })
    }

    /// Same client settings, but ignoring proxy variables from the environment
    #[cfg(test)]
    pub(crate) fn without_system_proxy(sync: &SyncConfig) -> Self {
        Self {
            client: Self::client_builder(sync).unwrap().no_proxy().build().unwrap(),
            max_feed_bytes: sync.max_feed_bytes,
        }
    }

    /// HTTP client settings: fixed User-Agent, total request timeout, optional proxy
    fn client_builder(sync: &SyncConfig) -> Result<ClientBuilder> {
        let mut builder = Client::builder()
            .timeout(sync.request_timeout())
            .user_agent(sync.user_agent.clone())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(ref proxy) = sync.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        Ok(builder)
    }

    /// Only absolute http(s) URLs are fetched
    pub fn validate_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url.trim())?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(Error::UnsupportedScheme {
                url: url.to_string(),
                scheme: scheme.to_string(),
            }),
        }
    }

    /// The form a feed URL is stored and looked up in
    pub fn normalize_url(url: &str) -> Result<String> {
        Ok(Self::validate_url(url)?.to_string())
    }

    /// Fetch and parse a feed from URL. Nothing is returned unless the whole document parsed.
    pub async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        let target = Self::validate_url(url)?;

        tracing::debug!(url, "Fetching feed");

        let mut response = self
            .client
            .get(target)
            .header(ACCEPT, HeaderValue::from_static(FEED_ACCEPT))
            .send()
            .await
            .map_err(|source| Error::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        if let Some(declared) = response.content_length() {
            self.ensure_content_size(usize::try_from(declared).unwrap_or(usize::MAX), url)?;
        }

        let body = self.read_body(&mut response, url).await?;

        let document = parse_feed(&body).map_err(|e| match e {
            Error::FeedParse(message) => Error::FeedParse(format!("{} ({})", message, url)),
            other => other,
        })?;

        tracing::debug!(url, items = document.items.len(), "Parsed feed");
        Ok(document)
    }

    /// Read the body chunk by chunk, giving up as soon as it passes the size limit
    async fn read_body(&self, response: &mut reqwest::Response, url: &str) -> Result<Bytes> {
        let mut body = BytesMut::new();
        loop {
            let chunk = response.chunk().await.map_err(|source| Error::Fetch {
                url: url.to_string(),
                source,
            })?;
            let Some(chunk) = chunk else {
                break;
            };
            self.ensure_content_size(body.len() + chunk.len(), url)?;
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    fn ensure_content_size(&self, size: usize, url: &str) -> Result<()> {
        if size > self.max_feed_bytes {
            return Err(Error::FeedTooLarge {
                url: url.to_string(),
                size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_document(&self, url: &str) -> Result<FeedDocument> {
        self.fetch(url).await
    }
}
