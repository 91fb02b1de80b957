use std::{fmt, process::Stdio};

use tokio::{process::Command, sync::watch};
use tracing::{debug, warn};

use crate::errors::ConnectError;

/// An external tunnel tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion unless `shutdown` flips to true first, in which
    /// case the child is killed.
    pub async fn run(&self, shutdown: &watch::Receiver<bool>) -> Result<(), ConnectError> {
        let mut shutdown = shutdown.clone();
        if *shutdown.borrow_and_update() {
            return Err(ConnectError::cancelled(self.to_string()));
        }

        debug!("Running {}", self);

        let mut command = Command::new(&self.program);
        // daemonizing tools can leave children holding stdout open
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = command.output();

        let cancelled = async {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // sender gone, nobody can cancel any more
                std::future::pending::<()>().await;
            }
        };

        let output = tokio::select! {
            output = output => output,
            _ = cancelled => {
                warn!("{} cancelled by shutdown", self);
                return Err(ConnectError::cancelled(self.to_string()));
            }
        };

        let output = output.map_err(|source| ConnectError::Spawn {
            command: self.to_string(),
            source,
        })?;

        if !output.status.success() {
            warn!(
                "{} exited with {}: {}",
                self,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ConnectError::command_failed(self.to_string(), output.status));
        }

        Ok(())
    }

    /// Blocking variant for teardown paths that cannot await
    pub fn run_blocking(&self) -> Result<(), ConnectError> {
        debug!("Running {}", self);

        let output = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ConnectError::Spawn {
                command: self.to_string(),
                source,
            })?;

        if !output.status.success() {
            warn!(
                "{} exited with {}: {}",
                self,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ConnectError::command_failed(self.to_string(), output.status));
        }

        Ok(())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
