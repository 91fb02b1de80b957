use thiserror::Error;

use super::{ConfigValidationError, ConnectError, InitializationError, QueueError, ReportError};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitializationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ProbeError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(ConfigValidationError::config(err.to_string()))
    }
}
