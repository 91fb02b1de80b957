use time::{format_description::well_known::Rfc3339, UtcOffset};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::{config::LoggingConfig, errors::InitializationError, ProbeError};

const LOG_FILE_PREFIX: &str = "vpn-probe.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber.
///
/// The returned guard flushes the file writer and must live as long as the
/// process logs to `log_dir`.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ProbeError> {
    config.validate()?;

    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        Rfc3339,
    );

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(config.thread_ids)
        .with_thread_names(config.thread_names)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_timer(timer.clone());
    if config.is_json() {
        layers.push(console.json().with_filter(env_filter(config)).boxed());
    } else {
        layers.push(console.with_filter(env_filter(config)).boxed());
    }

    let guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_timer(timer)
                    .with_filter(env_filter(config))
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    Registry::default().with(layers).try_init().map_err(|e| {
        ProbeError::Init(InitializationError::logging(format!(
            "Failed to initialize logging: {}",
            e
        )))
    })?;

    Ok(guard)
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::default().add_directive(config.get_level_filter().into())
}
