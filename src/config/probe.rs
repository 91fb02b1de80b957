use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use config::{
    builder::{ConfigBuilder as Builder, DefaultState},
    Config as ConfigBuilder, ConfigError, Environment, File, FileFormat,
};

use crate::errors::ConfigValidationError;

use super::{
    CollectorConfig, ConnectorConfig, HttpConfig, IdentityConfig, LoggingConfig, QueueConfig,
    TesterConfig,
};

/// Main application configuration
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Probe identity
    #[serde(default)]
    pub probe: IdentityConfig,

    /// Job queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// Result collector webhook
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Tunnel tools
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Measurement parameters
    #[serde(default)]
    pub tester: TesterConfig,

    /// Health endpoint
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Default configuration directory
    pub const CONFIG_DIR: &'static str = "config";

    /// Prefix of nested environment overrides (PROBE__QUEUE__IDLE_BACKOFF)
    const ENV_PREFIX: &'static str = "PROBE";
    const ENV_SEPARATOR: &'static str = "__";

    /// Flat variables understood by every probe deployment
    const FLAT_ENV: [(&'static str, &'static str); 4] = [
        ("PROBE_ID", "probe.id"),
        ("REDIS_URL", "queue.url"),
        ("WEBHOOK_URL", "collector.url"),
        ("WEBHOOK_SECRET", "collector.secret"),
    ];
    const DRY_RUN_ENV: &'static str = "PROBE_DRY_RUN";

    /// Build configuration using the following priority (highest to lowest):
    /// 1. Flat variables (PROBE_ID, REDIS_URL, WEBHOOK_URL, WEBHOOK_SECRET, PROBE_DRY_RUN)
    /// 2. Nested environment variables (PROBE__*)
    /// 3. Environment specific file (config/{RUN_MODE}.yaml)
    /// 4. Probe file (config/probe.yaml)
    /// 5. Built-in defaults
    pub fn new() -> Result<Self, ConfigError> {
        Self::build(None, std::env::vars().collect())
    }

    /// Load configuration from a specific file, environment still overrides it
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        Self::build(Some(path), std::env::vars().collect())
    }

    /// Same as [`Config::new`] / [`Config::from_file`] with an explicit environment
    pub fn build(path: Option<PathBuf>, env: HashMap<String, String>) -> Result<Self, ConfigError> {
        // Start with default values
        let builder = Self::with_defaults(ConfigBuilder::builder())?;

        // Add config files
        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => {
                let run_mode = env
                    .get("RUN_MODE")
                    .cloned()
                    .unwrap_or_else(|| "production".into());

                builder
                    .add_source(
                        File::new(&format!("{}/probe", Self::CONFIG_DIR), FileFormat::Yaml)
                            .required(false),
                    )
                    .add_source(
                        File::new(&format!("{}/{}", Self::CONFIG_DIR, run_mode), FileFormat::Yaml)
                            .required(false),
                    )
            }
        };

        // Add nested environment variables (PROBE__QUEUE__IDLE_BACKOFF)
        let mut builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator(Self::ENV_SEPARATOR)
                .separator(Self::ENV_SEPARATOR)
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        // Flat variables win over everything, blank ones are ignored
        for (var, key) in Self::FLAT_ENV {
            let value = env.get(var).filter(|v| !v.trim().is_empty()).cloned();
            builder = builder.set_override_option(key, value)?;
        }

        let dry_run = env
            .get(Self::DRY_RUN_ENV)
            .map(|v| parse_bool_flag(v).unwrap_or(false));
        builder = builder.set_override_option("probe.dry_run", dry_run)?;

        // Build and validate
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn with_defaults(
        builder: Builder<DefaultState>,
    ) -> Result<Builder<DefaultState>, ConfigError> {
        // Durations go in as humantime strings so humantime_serde can read them back
        let defaults = Config::default();

        builder
            // Identity
            .set_default("probe.id", defaults.probe.id)?
            .set_default("probe.dry_run", defaults.probe.dry_run)?
            // Queue
            .set_default("queue.url", defaults.queue.url)?
            .set_default("queue.key_prefix", defaults.queue.key_prefix)?
            .set_default("queue.idle_backoff", humantime(defaults.queue.idle_backoff))?
            .set_default("queue.error_backoff", humantime(defaults.queue.error_backoff))?
            // Collector
            .set_default("collector.url", defaults.collector.url.clone())?
            .set_default("collector.secret", defaults.collector.secret.clone())?
            .set_default("collector.timeout", humantime(defaults.collector.timeout))?
            // Connector
            .set_default(
                "connector.work_dir",
                defaults.connector.work_dir.to_string_lossy().into_owned(),
            )?
            .set_default("connector.wg_quick_bin", defaults.connector.wg_quick_bin)?
            .set_default("connector.openvpn_bin", defaults.connector.openvpn_bin)?
            .set_default("connector.pkill_bin", defaults.connector.pkill_bin)?
            // Tester
            .set_default(
                "tester.latency_timeout",
                humantime(defaults.tester.latency_timeout),
            )?
            .set_default(
                "tester.latency_samples",
                i64::from(defaults.tester.latency_samples),
            )?
            .set_default("tester.speed_test_url", defaults.tester.speed_test_url)?
            .set_default(
                "tester.speed_test_timeout",
                humantime(defaults.tester.speed_test_timeout),
            )?
            .set_default("tester.upload_ratio", defaults.tester.upload_ratio)?
            .set_default(
                "tester.streaming_timeout",
                humantime(defaults.tester.streaming_timeout),
            )?
            // HTTP
            .set_default("http.enabled", defaults.http.enabled)?
            .set_default("http.bind_addr", defaults.http.bind_addr)?
            .set_default("http.bind_port", i64::from(defaults.http.bind_port))?
            // Logging
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default(
                "logging.include_location",
                defaults.logging.include_location,
            )?
            .set_default("logging.thread_ids", defaults.logging.thread_ids)?
            .set_default("logging.thread_names", defaults.logging.thread_names)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        fn require(var: &'static str, value: &str) -> Result<(), ConfigValidationError> {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::Missing(var));
            }
            Ok(())
        }

        fn non_zero(field: &'static str, value: Duration) -> Result<(), ConfigValidationError> {
            if value.is_zero() {
                return Err(ConfigValidationError::invalid(field, "must be non-zero"));
            }
            Ok(())
        }

        require("PROBE_ID", &self.probe.id)?;
        require("REDIS_URL", &self.queue.url)?;
        require("WEBHOOK_URL", &self.collector.url)?;
        require("WEBHOOK_SECRET", &self.collector.secret)?;

        let url = reqwest::Url::parse(&self.collector.url)
            .map_err(|e| ConfigValidationError::invalid("collector.url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigValidationError::invalid(
                "collector.url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.queue.key_prefix.is_empty() {
            return Err(ConfigValidationError::invalid(
                "queue.key_prefix",
                "must not be empty",
            ));
        }
        non_zero("queue.idle_backoff", self.queue.idle_backoff)?;
        non_zero("queue.error_backoff", self.queue.error_backoff)?;
        non_zero("collector.timeout", self.collector.timeout)?;
        non_zero("tester.latency_timeout", self.tester.latency_timeout)?;
        non_zero("tester.speed_test_timeout", self.tester.speed_test_timeout)?;
        non_zero("tester.streaming_timeout", self.tester.streaming_timeout)?;

        if self.tester.latency_samples == 0 {
            return Err(ConfigValidationError::invalid(
                "tester.latency_samples",
                "must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.tester.upload_ratio) {
            return Err(ConfigValidationError::invalid(
                "tester.upload_ratio",
                format!("{} is outside [0, 1]", self.tester.upload_ratio),
            ));
        }

        if self.http.enabled && self.http.bind_addr.is_empty() {
            return Err(ConfigValidationError::invalid(
                "http.bind_addr",
                "must not be empty",
            ));
        }

        self.logging.validate()
    }
}

fn humantime(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Boolean flag parsing compatible with the probe fleet's env files:
/// 1/t/true and 0/f/false in any case. `None` for anything else.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}
