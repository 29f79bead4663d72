use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("countdown must start above zero")]
    ZeroCountdown,
    #[error("request timeout must be above zero")]
    ZeroTimeout,
}

/// Resolved settings for one chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_url: Url,
    /// Value the decorative countdown restarts from on every submission.
    pub countdown_start: u32,
    /// Period between countdown ticks. One second outside of tests.
    pub tick: Duration,
    pub request_timeout: Duration,
}

impl ChatConfig {
    pub fn new(
        api_url: &str,
        countdown_start: u32,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        if countdown_start == 0 {
            return Err(ConfigError::ZeroCountdown);
        }
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            countdown_start,
            tick: Duration::from_secs(1),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Absolute URL of an endpoint below the API base.
    pub fn endpoint(&self, path: &str) -> Url {
        // parse_api_url guarantees a trailing slash, so join appends.
        self.api_url
            .join(path)
            .unwrap_or_else(|_| self.api_url.clone())
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
