//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `config/callbridge.*` file, `CALLBRIDGE__SECTION__KEY` environment variables,
//! then the conventional `ACS_CONNECTION_STRING`, `CALLBACK_EVENTS_URI` and
//! `DATABASE_URL` variables.

use crate::domain::shared::{DomainError, Result};
use crate::infrastructure::acs::{ConnectionString, DEFAULT_API_VERSION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path suffix every callback URL shares
pub const CALLBACKS_PATH: &str = "/api/callbacks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub acs: AcsConfig,
    pub store: StoreConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcsConfig {
    /// `endpoint=https://<resource>.communication.azure.com/;accesskey=<base64>`
    pub connection_string: String,
    /// Public base for lifecycle callbacks; the audio connection host is derived from it
    pub callback_events_uri: String,
    pub api_version: String,
    /// Deadline for call-automation requests; unset means no deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub record_ttl_secs: u64,
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Outbound frames buffered per call before the oldest are dropped
    pub outbound_queue_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8765,
            },
            acs: AcsConfig {
                connection_string: String::new(),
                callback_events_uri: format!("http://localhost:8765{}", CALLBACKS_PATH),
                api_version: DEFAULT_API_VERSION.to_string(),
                request_timeout_secs: None,
            },
            store: StoreConfig {
                database_url: String::new(),
                max_connections: 10,
                record_ttl_secs: 3600,
                purge_interval_secs: 60,
            },
            media: MediaConfig {
                outbound_queue_frames: 50,
            },
        }
    }
}

impl Config {
    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self> {
        let defaults = Config::default();

        let settings = config::Config::builder()
            .add_source(
                config::Config::try_from(&defaults)
                    .map_err(|e| DomainError::Configuration(e.to_string()))?,
            )
            .add_source(config::File::with_name("config/callbridge").required(false))
            .add_source(
                config::Environment::with_prefix("CALLBRIDGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option(
                "acs.connection_string",
                std::env::var("ACS_CONNECTION_STRING").ok(),
            )
            .and_then(|b| {
                b.set_override_option(
                    "acs.callback_events_uri",
                    std::env::var("CALLBACK_EVENTS_URI").ok(),
                )
            })
            .and_then(|b| b.set_override_option("store.database_url", std::env::var("DATABASE_URL").ok()))
            .map_err(|e| DomainError::Configuration(e.to_string()))?
            .build()
            .map_err(|e| DomainError::Configuration(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| DomainError::Configuration(e.to_string()))?;
        config.acs.callback_events_uri = normalize_callback_base(&config.acs.callback_events_uri);
        Ok(config)
    }

    /// Reject a configuration the service cannot run with
    pub fn validate(&self) -> Result<()> {
        ConnectionString::parse(&self.acs.connection_string)?;

        if self.store.database_url.trim().is_empty() {
            return Err(DomainError::Configuration(
                "DATABASE_URL is required: the correlation store must be shared".to_string(),
            ));
        }

        let base = reqwest::Url::parse(&self.acs.callback_events_uri).map_err(|e| {
            DomainError::Configuration(format!(
                "invalid callback events URI '{}': {}",
                self.acs.callback_events_uri, e
            ))
        })?;
        if base.host_str().is_none() {
            return Err(DomainError::Configuration(format!(
                "callback events URI '{}' has no host",
                self.acs.callback_events_uri
            )));
        }

        if self.media.outbound_queue_frames == 0 {
            return Err(DomainError::Configuration(
                "media.outbound_queue_frames must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.store.record_ttl_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.acs.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.store.purge_interval_secs.max(1))
    }
}

/// Make sure the callback base ends with the callbacks path
pub fn normalize_callback_base(uri: &str) -> String {
    let trimmed = uri.trim().trim_end_matches('/');
    if trimmed.ends_with(CALLBACKS_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CALLBACKS_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.acs.connection_string =
            "endpoint=https://contoso.communication.azure.com/;accesskey=c2VjcmV0".to_string();
        config.store.database_url = "postgres://localhost/callbridge".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.store.record_ttl_secs, 3600);
        assert_eq!(config.record_ttl(), Duration::from_secs(3600));
        assert_eq!(config.bind_address(), "0.0.0.0:8765");
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_request_timeout_opt_in() {
        let mut config = valid();
        config.acs.request_timeout_secs = Some(15);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_connection_string_is_fatal() {
        let mut config = valid();
        config.acs.connection_string.clear();
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let mut config = valid();
        config.store.database_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_callback_uri() {
        let mut config = valid();
        config.acs.callback_events_uri = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_callback_base() {
        assert_eq!(
            normalize_callback_base("https://bot.example.com"),
            "https://bot.example.com/api/callbacks"
        );
        assert_eq!(
            normalize_callback_base("https://bot.example.com/"),
            "https://bot.example.com/api/callbacks"
        );
        assert_eq!(
            normalize_callback_base("http://localhost:8000/api/callbacks"),
            "http://localhost:8000/api/callbacks"
        );
    }
}
