use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Redis connection URL
    #[serde(default)]
    pub url: String,
    /// Prefix of the per-probe list key
    pub key_prefix: String,
    /// Wait after an empty poll
    #[serde(with = "humantime_serde")]
    pub idle_backoff: Duration,
    /// Wait after a failed poll or a malformed job
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: "probe:jobs".to_string(),
            idle_backoff: Duration::from_secs(10),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn key_for(&self, probe_id: &str) -> String {
        format!("{}:{}", self.key_prefix, probe_id)
    }
}
