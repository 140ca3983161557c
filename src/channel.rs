//! Streaming-platform channel lookup
//!
//! Only the follower count is needed, and only at registration time to pick
//! the starting balance.

use crate::config::ChannelConfig;
use crate::errors::ChannelError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ChannelInfo: Send + Sync {
    /// Follower count of a channel
    async fn follower_count(&self, channel: &str) -> Result<u64, ChannelError>;
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    #[serde(default)]
    followers_count: u64,
}

/// HTTP client for the platform's public channel API
#[derive(Clone)]
pub struct KickChannelClient {
    base_url: String,
    http: reqwest::Client,
}

impl KickChannelClient {
    pub fn new(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("zeppelin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl ChannelInfo for KickChannelClient {
    async fn follower_count(&self, channel: &str) -> Result<u64, ChannelError> {
        let url = format!("{}/channels/{}", self.base_url, channel);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status.as_u16()));
        }

        let body: ChannelResponse = response.json().await?;
        debug!(channel = %channel, followers = body.followers_count, "Fetched channel info");
        Ok(body.followers_count)
    }
}

/// Fixed follower counts, for tests and offline runs
#[derive(Debug, Default, Clone)]
pub struct StaticChannelInfo {
    counts: HashMap<String, u64>,
    fallback: Option<u64>,
}

impl StaticChannelInfo {
    /// Every channel reports `count`
    pub fn constant(count: u64) -> Self {
        Self {
            counts: HashMap::new(),
            fallback: Some(count),
        }
    }

    /// Every lookup fails
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: &str, count: u64) -> Self {
        self.counts.insert(channel.to_string(), count);
        self
    }
}

#[async_trait]
impl ChannelInfo for StaticChannelInfo {
    async fn follower_count(&self, channel: &str) -> Result<u64, ChannelError> {
        self.counts
            .get(channel)
            .copied()
            .or(self.fallback)
            .ok_or(ChannelError::Status(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_channel_info() {
        let info = StaticChannelInfo::constant(50).with_channel("big", 150);
        assert_eq!(info.follower_count("big").await.unwrap(), 150);
        assert_eq!(info.follower_count("other").await.unwrap(), 50);

        let down = StaticChannelInfo::unavailable();
        assert!(matches!(
            down.follower_count("big").await,
            Err(ChannelError::Status(404))
        ));
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = ChannelConfig {
            api_base_url: "http://localhost:9/api/v1/".to_string(),
            ..ChannelConfig::default()
        };
        let client = KickChannelClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/api/v1");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let config = ChannelConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..ChannelConfig::default()
        };
        let client = KickChannelClient::new(&config).unwrap();
        assert!(client.follower_count("anyone").await.is_err());
    }
}
