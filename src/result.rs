use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    job::Job,
    tester::{LatencyReport, Throughput},
};

/// Per-platform streaming unlock outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingResult {
    pub platform: String,
    pub is_unlocked: bool,
    pub response_ms: u64,
}

/// The record posted to the collector, one per job.
///
/// Measurements without data are written as zero: the collector requires
/// numeric values for `ping_ms`, `download_mbps` and `upload_mbps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub server_id: i64,
    pub probe_id: String,
    /// Milliseconds since the epoch, stamped by the reporter at send time
    pub timestamp: i64,
    pub ping_ms: u32,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub jitter_ms: u32,
    pub packet_loss_pct: f64,
    pub connection_success: bool,
    pub connection_time_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streaming_results: Vec<StreamingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    fn empty(job: &Job, probe_id: &str) -> Self {
        Self {
            server_id: job.server_id,
            probe_id: probe_id.to_string(),
            timestamp: 0,
            ping_ms: 0,
            download_mbps: 0.0,
            upload_mbps: 0.0,
            jitter_ms: 0,
            packet_loss_pct: 0.0,
            connection_success: false,
            connection_time_ms: 0,
            streaming_results: Vec::new(),
            error: None,
        }
    }

    pub fn connected(job: &Job, probe_id: &str, established_in: Duration) -> Self {
        Self {
            connection_success: true,
            connection_time_ms: duration_ms(established_in),
            ..Self::empty(job, probe_id)
        }
    }

    pub fn connect_failed(job: &Job, probe_id: &str, error: impl Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(job, probe_id)
        }
    }

    pub fn record_latency(&mut self, report: &LatencyReport) {
        // a measured sub-millisecond connect must not read as "no data"
        self.ping_ms = report
            .best
            .map(|best| duration_ms_u32(best).max(1))
            .unwrap_or(0);
        self.jitter_ms = report.jitter.map(duration_ms_u32).unwrap_or(0);
        self.packet_loss_pct = report.packet_loss_pct;
    }

    pub fn record_throughput(&mut self, throughput: Option<Throughput>) {
        let throughput = throughput.unwrap_or_default();
        self.download_mbps = throughput.download_mbps;
        self.upload_mbps = throughput.upload_mbps;
    }

    pub fn record_streaming(&mut self, results: Vec<StreamingResult>) {
        self.streaming_results = results;
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn duration_ms_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
