use std::{path::PathBuf, process::ExitStatus};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("missing {protocol} config for server {server_id}")]
    MissingConfig {
        protocol: &'static str,
        server_id: String,
    },

    #[error("write {protocol} config {}: {source}", .path.display())]
    WriteConfig {
        protocol: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed to start: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("{command} cancelled by shutdown")]
    Cancelled { command: String },

    #[error("teardown task failed: {0}")]
    Teardown(String),
}

impl ConnectError {
    pub fn missing_config(protocol: &'static str, server_id: impl Into<String>) -> Self {
        Self::MissingConfig {
            protocol,
            server_id: server_id.into(),
        }
    }

    pub fn command_failed(command: impl Into<String>, status: ExitStatus) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status,
        }
    }

    pub fn cancelled(command: impl Into<String>) -> Self {
        Self::Cancelled {
            command: command.into(),
        }
    }
}
