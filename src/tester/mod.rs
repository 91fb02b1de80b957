//! Connection quality measurements run through an established tunnel.
//!
//! Every probe degrades to "no data" on failure; nothing here returns an
//! error to the job loop.

mod latency;
mod streaming;
mod throughput;

pub use latency::{normalize_target, LatencyProbe, LatencyReport};
pub use streaming::{is_unlocked, StreamingProbe, PLATFORMS};
pub use throughput::{compute_throughput, Throughput, ThroughputProbe};

use async_trait::async_trait;

use crate::{config::TesterConfig, errors::InitializationError, result::StreamingResult};

/// The measurement capability the job loop depends on
#[async_trait]
pub trait Measurements: Send + Sync {
    async fn latency(&self, targets: &[String]) -> LatencyReport;

    async fn throughput(&self) -> Option<Throughput>;

    async fn streaming(&self, platforms: &[String]) -> Vec<StreamingResult>;
}

/// Network-backed measurements
#[derive(Debug, Clone)]
pub struct TesterSuite {
    latency: LatencyProbe,
    throughput: ThroughputProbe,
    streaming: StreamingProbe,
}

impl TesterSuite {
    pub fn new(config: &TesterConfig) -> Result<Self, InitializationError> {
        let throughput = ThroughputProbe::new(
            config.speed_test_url.clone(),
            config.speed_test_timeout,
            config.upload_ratio,
        )
        .map_err(|e| InitializationError::http_client(e.to_string()))?;

        let streaming = StreamingProbe::new(config.streaming_timeout)
            .map_err(|e| InitializationError::http_client(e.to_string()))?;

        Ok(Self {
            latency: LatencyProbe::new(config.latency_timeout, config.latency_samples),
            throughput,
            streaming,
        })
    }
}

#[async_trait]
impl Measurements for TesterSuite {
    async fn latency(&self, targets: &[String]) -> LatencyReport {
        self.latency.measure(targets).await
    }

    async fn throughput(&self) -> Option<Throughput> {
        self.throughput.measure().await
    }

    async fn streaming(&self, platforms: &[String]) -> Vec<StreamingResult> {
        self.streaming.check(platforms).await
    }
}
