use std::time::Duration;

use chrono::TimeDelta;
use hunch::BindingConfig;

use crate::engagement::Interaction;

/// Where mutations are sent unless the host says otherwise.
pub fn default_deployment_url() -> &'static str {
    if cfg!(feature = "local-backend") {
        "http://127.0.0.1:3210"
    } else {
        "https://feed-reader.convex.cloud"
    }
}

/// Tunables for the feed client. Every field has a default, so the host only sends what it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedConfig {
    pub deployment_url: String,

    pub like_stale_after_ms: u64,
    pub retweet_stale_after_ms: u64,
    pub follow_stale_after_ms: u64,
    pub comment_count_stale_after_ms: u64,

    /// How far apart a placeholder comment and its server copy may be timestamped and still match.
    pub placeholder_window_ms: u64,
    pub max_comment_chars: usize,

    pub trending_ttl_minutes: i64,
    pub trending_size: usize,
    pub feed_page_size: usize,

    /// Show a toast when a write succeeds, not only when it fails.
    pub announce_success: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            deployment_url: default_deployment_url().to_string(),
            like_stale_after_ms: 3_000,
            retweet_stale_after_ms: 5_000,
            follow_stale_after_ms: 3_000,
            comment_count_stale_after_ms: 5_000,
            placeholder_window_ms: 30_000,
            max_comment_chars: 2_000,
            trending_ttl_minutes: 10,
            trending_size: 5,
            feed_page_size: 20,
            announce_success: false,
        }
    }
}

impl FeedConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn binding_config(&self, interaction: Interaction) -> BindingConfig {
        BindingConfig::stale_after_ms(match interaction {
            Interaction::Like => self.like_stale_after_ms,
            Interaction::Retweet => self.retweet_stale_after_ms,
            Interaction::Follow => self.follow_stale_after_ms,
        })
    }

    pub fn comment_count_config(&self) -> BindingConfig {
        BindingConfig::stale_after_ms(self.comment_count_stale_after_ms)
    }

    pub fn placeholder_window(&self) -> Duration {
        Duration::from_millis(self.placeholder_window_ms)
    }

    pub fn trending_ttl(&self) -> TimeDelta {
        TimeDelta::minutes(self.trending_ttl_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let config = FeedConfig::from_json(r#"{"retweetStaleAfterMs": 8000, "announceSuccess": true}"#)
            .unwrap();
        assert_eq!(config.binding_config(Interaction::Retweet).stale_after_ms, 8_000);
        assert_eq!(config.binding_config(Interaction::Like).stale_after_ms, 3_000);
        assert!(config.announce_success);
        assert_eq!(config.max_comment_chars, 2_000);
        assert_eq!(config.deployment_url, default_deployment_url());
    }
}
