use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// User that owns feeds added from the CLI
    #[serde(default)]
    pub current_user: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            current_user: None,
        }
    }
}

/// What the scheduler does with `last_fetched_at` when a fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark the feed fetched anyway so a broken feed cannot monopolise the poller
    #[default]
    Advance,
    /// Leave the timestamp alone; the feed stays first in line for the next tick
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between poll cycles when none is given on the command line
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// User-Agent sent with every feed request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Largest response body accepted, in bytes
    #[serde(default = "default_max_feed_bytes")]
    pub max_feed_bytes: usize,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub on_fetch_failure: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            max_feed_bytes: default_max_feed_bytes(),
            proxy_url: None,
            on_fetch_failure: FailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gator")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "gator".to_string()
}

fn default_max_feed_bytes() -> usize {
    5 * 1024 * 1024
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Reject values the scheduler and fetcher cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.sync.poll_interval_secs == 0 {
            return Err(crate::Error::Config(
                "sync.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "sync.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync.user_agent.trim().is_empty() {
            return Err(crate::Error::Config("sync.user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/gator/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("gator")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("gator.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.sync.user_agent, "gator");
        assert_eq!(config.sync.on_fetch_failure, FailurePolicy::Advance);
        assert!(config.general.current_user.is_none());
        assert!(config.database_path().ends_with("gator.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [general]
            current_user = "kahya"

            [sync]
            poll_interval_secs = 30
            on_fetch_failure = "retry"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.current_user.as_deref(), Some("kahya"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.sync.request_timeout_secs, 10);
        assert_eq!(config.sync.on_fetch_failure, FailurePolicy::Retry);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.sync.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("gator-config-{}", uuid::Uuid::new_v4()))
            .join("config.toml");

        let mut config = AppConfig::default();
        config.general.current_user = Some("holgith".to_string());
        config.sync.proxy_url = Some("socks5://127.0.0.1:1080".to_string());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.general.current_user.as_deref(), Some("holgith"));
        assert_eq!(loaded.sync.proxy_url, config.sync.proxy_url);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("gator-missing-{}.toml", uuid::Uuid::new_v4()));
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.sync.poll_interval_secs, 60);
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde(Path::new("/var/lib/gator")), PathBuf::from("/var/lib/gator"));
    }
}
