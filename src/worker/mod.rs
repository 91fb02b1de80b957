//! The sequential job loop.

mod backoff;

pub use backoff::{PollBackoff, PollOutcome};

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    connector::Connector,
    job::Job,
    queue::JobSource,
    reporter::ResultSink,
    result::TestResult,
    stats::ProbeStats,
    tester::Measurements,
    utils::generate_job_id,
};

pub struct ProbeWorker {
    probe_id: String,
    backoff: PollBackoff,
    stats: Arc<ProbeStats>,
    connector: Connector,
    queue: Arc<dyn JobSource>,
    measurements: Arc<dyn Measurements>,
    reporter: Arc<dyn ResultSink>,
}

impl ProbeWorker {
    pub fn new(
        probe_id: impl Into<String>,
        backoff: PollBackoff,
        stats: Arc<ProbeStats>,
        connector: Connector,
        queue: Arc<dyn JobSource>,
        measurements: Arc<dyn Measurements>,
        reporter: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            probe_id: probe_id.into(),
            backoff,
            stats,
            connector,
            queue,
            measurements,
            reporter,
        }
    }

    pub fn stats(&self) -> &Arc<ProbeStats> {
        &self.stats
    }

    /// Poll and process jobs one at a time until `shutdown` is set.
    ///
    /// Shutdown is checked before each poll and ends a backoff wait early.
    /// A job already running is finished and reported first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Probe {} started (dry run: {})",
            self.probe_id,
            self.connector.is_dry_run()
        );

        loop {
            if *shutdown.borrow_and_update() {
                info!("Job loop received shutdown signal");
                break;
            }

            let outcome = self.poll_once(&shutdown).await;

            if let Some(delay) = self.backoff.next_backoff(outcome) {
                sleep_or_shutdown(delay, &mut shutdown).await;
            }
        }

        info!("Job loop exited");
    }

    /// Take at most one job off the queue and see it through
    pub async fn poll_once(&self, shutdown: &watch::Receiver<bool>) -> PollOutcome {
        match self.queue.next_job().await {
            Ok(Some(job)) => {
                self.handle_job(job, shutdown).await;
                PollOutcome::Processed
            }
            Ok(None) => {
                debug!("No job queued");
                PollOutcome::Idle
            }
            Err(e) => {
                error!("Job fetch failed: {}", e);
                PollOutcome::Failed
            }
        }
    }

    async fn handle_job(&self, job: Job, shutdown: &watch::Receiver<bool>) {
        let span = info_span!(
            "job",
            job_id = %generate_job_id(),
            server_id = job.server_id,
            tier = %job.tier,
            protocol = %job.protocol,
        );

        async {
            let result = self.process_job(&job, shutdown).await;

            if let Err(e) = self.reporter.send(result).await {
                error!("Reporter error: {}", e);
                self.stats.record_report_failure();
            }

            self.stats.record_test();
        }
        .instrument(span)
        .await
    }

    /// Connect, measure what the tier asks for, disconnect and build the
    /// result. The tunnel is torn down before this returns, or by its drop
    /// guard if a measurement panics.
    pub async fn process_job(&self, job: &Job, shutdown: &watch::Receiver<bool>) -> TestResult {
        let mut connection = match self
            .connector
            .connect(&job.server, &job.protocol, shutdown)
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.stats.record_connect_failure();
                return TestResult::connect_failed(job, &self.probe_id, e);
            }
        };

        let mut result = TestResult::connected(job, &self.probe_id, connection.established_in());

        let latency = self.measurements.latency(&job.latency_targets).await;
        result.record_latency(&latency);

        if job.tier.measures_throughput() {
            result.record_throughput(self.measurements.throughput().await);
        }

        if job.tier.measures_streaming() {
            result.record_streaming(self.measurements.streaming(&job.streaming_targets).await);
        }

        if let Err(e) = connection.disconnect().await {
            error!(
                "Disconnect from server {} failed: {}",
                connection.server_id(),
                e
            );
        }

        info!(
            "Server {} done: ping {} ms, down {:.1} Mbps, up {:.1} Mbps",
            job.server_id, result.ping_ms, result.download_mbps, result.upload_mbps
        );

        result
    }
}

async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) {
    let stopped = async {
        if shutdown.wait_for(|stop| *stop).await.is_err() {
            // sender gone, only the timer can end the wait
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sleep(delay) => {}
        _ = stopped => debug!("Backoff interrupted by shutdown"),
    }
}
