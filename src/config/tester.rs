use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// TCP connect timeout per latency attempt
    #[serde(with = "humantime_serde")]
    pub latency_timeout: Duration,
    /// Connect attempts per latency target
    pub latency_samples: u32,
    /// Fixed-size download used for throughput
    pub speed_test_url: String,
    #[serde(with = "humantime_serde")]
    pub speed_test_timeout: Duration,
    /// Upload is derived from download, not measured
    pub upload_ratio: f64,
    #[serde(with = "humantime_serde")]
    pub streaming_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latency_timeout: Duration::from_secs(3),
            latency_samples: 1,
            speed_test_url: "https://speed.cloudflare.com/__down?bytes=10000000".to_string(),
            speed_test_timeout: Duration::from_secs(30),
            upload_ratio: 0.3,
            streaming_timeout: Duration::from_secs(10),
        }
    }
}
