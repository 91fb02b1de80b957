use clap::{Args, Parser};
use std::{path::PathBuf, sync::Arc};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};
use tracing::{error, info, warn};

use vpn_probe::{
    http_api::{start_http_server, HealthState},
    Connector, PollBackoff, ProbeConfig, ProbeError, ProbeStats, ProbeWorker, RedisJobQueue,
    TesterSuite, WebhookReporter,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a YAML config file, environment variables still override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump default config and exit
    #[arg(long = "dump-default-config")]
    dump_default: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("vpn-probe: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ProbeError> {
    // Parse command line args
    let cli = Cli::parse();

    if cli.common.dump_default {
        let config = ProbeConfig::default();
        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| vpn_probe::errors::ConfigValidationError::config(e.to_string()))?;
        print!("{}", yaml);
        return Ok(());
    }

    // Load config
    let config = match &cli.common.config {
        Some(path) => ProbeConfig::from_file(path.clone())?,
        None => ProbeConfig::new()?,
    };

    // Initialize logging, the guard flushes the log file on exit
    let _log_guard = vpn_probe::setup_logging(&config.logging)?;

    if let Some(path) = &cli.common.config {
        info!("Loaded config from {}", path.display());
    }

    if !config.probe.dry_run && !running_as_root() {
        warn!("Not running as root, tunnel tools will probably fail");
    }

    // SIGINT/SIGTERM end the loop after the current job
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx)?;

    let stats = Arc::new(ProbeStats::new());

    // Start health server
    let health = if config.http.enabled {
        let state = Arc::new(HealthState {
            probe_id: config.probe.id.clone(),
            stats: Arc::clone(&stats),
        });
        let address = config.http.bind_addr.clone();
        let port = config.http.bind_port;
        let shutdown = shutdown_rx.clone();

        Some(tokio::spawn(async move {
            if let Err(e) = start_http_server(address, port, state, shutdown).await {
                error!("Health server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Create and run worker
    let worker = ProbeWorker::new(
        config.probe.id.clone(),
        PollBackoff::from_config(&config.queue),
        stats,
        Connector::new(&config.connector, config.probe.dry_run),
        Arc::new(RedisJobQueue::new(&config.queue, &config.probe.id)?),
        Arc::new(TesterSuite::new(&config.tester)?),
        Arc::new(WebhookReporter::new(&config.collector)?),
    );

    worker.run(shutdown_rx).await;

    if let Some(health) = health {
        let _ = health.await;
    }

    info!("Probe stopped");
    Ok(())
}

fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

fn spawn_signal_handler(shutdown: watch::Sender<bool>) -> Result<(), ProbeError> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => info!("Received SIGTERM"),
            _ = interrupt.recv() => info!("Received SIGINT"),
        }
        info!("Finishing current job before shutdown");
        shutdown.send_replace(true);
    });

    Ok(())
}
