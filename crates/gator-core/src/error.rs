use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Feed too large ({size} bytes) for URL: {url}")]
    FeedTooLarge { url: String, size: usize },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),
}

/// Coarse grouping used when reporting a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fetch,
    Parse,
    Persistence,
    Config,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Fetch => "fetch",
            ErrorClass::Parse => "parse",
            ErrorClass::Persistence => "persistence",
            ErrorClass::Config => "config",
        }
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Fetch { .. }
            | Error::HttpStatus { .. }
            | Error::FeedTooLarge { .. }
            | Error::UnsupportedScheme { .. }
            | Error::UrlParse(_) => ErrorClass::Fetch,
            Error::FeedParse(_) => ErrorClass::Parse,
            Error::Database(_) | Error::FeedNotFound(_) | Error::UserNotFound(_) => {
                ErrorClass::Persistence
            }
            Error::Config(_) | Error::Io(_) => ErrorClass::Config,
        }
    }

    /// True when the request was abandoned because the client timeout elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Fetch { source, .. } if source.is_timeout())
    }

    /// True when a write was rejected by a UNIQUE constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::FeedParse("bad".into()).class(), ErrorClass::Parse);
        assert_eq!(
            Error::FeedTooLarge { url: "https://example.com".into(), size: 10 }.class(),
            ErrorClass::Fetch
        );
        assert_eq!(Error::FeedNotFound("x".into()).class(), ErrorClass::Persistence);
        assert_eq!(Error::Config("x".into()).class(), ErrorClass::Config);
        assert_eq!(ErrorClass::Persistence.as_str(), "persistence");
    }

    #[test]
    fn test_parse_error_is_not_timeout() {
        assert!(!Error::FeedParse("bad".into()).is_timeout());
        assert!(!Error::FeedParse("bad".into()).is_unique_violation());
    }
}
