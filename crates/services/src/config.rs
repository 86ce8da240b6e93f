use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CACHE_DB: &str = "sqlite://course-cache.sqlite3";
pub const DEFAULT_RATE_LIMIT_FALLBACK_SECS: u64 = 30;
pub const DEFAULT_CHECKPOINT_SECS: u64 = 5;
pub const DEFAULT_ACCESS_PING_SECS: u64 = 3;
pub const DEFAULT_RETRY_REDIRECT_SECS: u64 = 2;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Everything the client needs to talk to the course service.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Always ends with `/` so relative endpoints join beneath it.
    pub base_url: Url,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub cache_db: String,
    pub rate_limit_fallback: Duration,
    pub checkpoint_interval: Duration,
    pub access_ping_delay: Duration,
    pub retry_redirect_delay: Duration,
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// Defaults for everything except the base url.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            access_token: None,
            refresh_token: None,
            cache_db: DEFAULT_CACHE_DB.to_owned(),
            rate_limit_fallback: Duration::from_secs(DEFAULT_RATE_LIMIT_FALLBACK_SECS),
            checkpoint_interval: Duration::from_secs(DEFAULT_CHECKPOINT_SECS),
            access_ping_delay: Duration::from_secs(DEFAULT_ACCESS_PING_SECS),
            retry_redirect_delay: Duration::from_secs(DEFAULT_RETRY_REDIRECT_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Read configuration from `COURSE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the base url is missing or malformed, or a
    /// duration variable is not a whole number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = non_empty(lookup("COURSE_API_BASE_URL")).ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBaseUrl {
            value: raw.clone(),
            reason: e.to_string(),
        })?;

        let mut config = Self::new(base_url);
        config.access_token = non_empty(lookup("COURSE_ACCESS_TOKEN"));
        config.refresh_token = non_empty(lookup("COURSE_REFRESH_TOKEN"));
        if let Some(db) = non_empty(lookup("COURSE_CACHE_DB")) {
            config.cache_db = db;
        }

        let seconds = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match non_empty(lookup(var)) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidSeconds { var, value }),
            }
        };
        config.rate_limit_fallback =
            seconds("COURSE_RATE_LIMIT_FALLBACK_SECS", config.rate_limit_fallback)?;
        config.checkpoint_interval = seconds("COURSE_CHECKPOINT_SECS", config.checkpoint_interval)?;
        config.access_ping_delay = seconds("COURSE_ACCESS_PING_SECS", config.access_ping_delay)?;
        config.retry_redirect_delay =
            seconds("COURSE_RETRY_REDIRECT_SECS", config.retry_redirect_delay)?;
        config.http_timeout = seconds("COURSE_HTTP_TIMEOUT_SECS", config.http_timeout)?;

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
