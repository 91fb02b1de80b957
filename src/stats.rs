use std::{
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use time::OffsetDateTime;

use crate::utils::now_millis;

/// Counters shared by the job loop and the health endpoint
#[derive(Debug)]
pub struct ProbeStats {
    started: Instant,
    /// Epoch millis of the last finished job, 0 before the first
    last_test_ms: AtomicI64,
    tests_today: AtomicU64,
    reports_failed: AtomicU64,
    connect_failures: AtomicU64,
}

/// Point-in-time copy of [`ProbeStats`]
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub last_test: Option<OffsetDateTime>,
    pub tests_today: u64,
    pub reports_failed: u64,
    pub connect_failures: u64,
}

impl Default for ProbeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_test_ms: AtomicI64::new(0),
            tests_today: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
        }
    }

    /// Called once per processed job, whether or not its report went through
    pub fn record_test(&self) {
        self.last_test_ms.store(now_millis(), Ordering::Relaxed);
        self.tests_today.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report_failure(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tests_today(&self) -> u64 {
        self.tests_today.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let last_test = match self.last_test_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok(),
        };

        StatsSnapshot {
            uptime: self.started.elapsed(),
            last_test,
            tests_today: self.tests_today.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
        }
    }
}
