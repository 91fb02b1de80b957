use std::{fmt, time::Duration};

use tracing::{debug, error, warn};

use crate::{errors::ConnectError, result::duration_ms};

use super::Protocol;

type Teardown = Box<dyn FnOnce() -> Result<(), ConnectError> + Send + 'static>;

/// RAII handle for an established tunnel.
///
/// The teardown action runs exactly once: through [`Connection::disconnect`],
/// or from `Drop` when the handle goes away on an early return or unwinding.
pub struct Connection {
    protocol: Protocol,
    server_id: String,
    established_in: Duration,
    teardown: Option<Teardown>,
}

impl Connection {
    pub fn new<F>(
        protocol: Protocol,
        server_id: impl Into<String>,
        established_in: Duration,
        teardown: F,
    ) -> Self
    where
        F: FnOnce() -> Result<(), ConnectError> + Send + 'static,
    {
        Self {
            protocol,
            server_id: server_id.into(),
            established_in,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn established_in(&self) -> Duration {
        self.established_in
    }

    pub fn connection_time_ms(&self) -> u64 {
        duration_ms(self.established_in)
    }

    /// Whether teardown is still pending
    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Tear the tunnel down. Later calls are no-ops.
    ///
    /// The teardown itself runs on the blocking pool, so it completes even if
    /// this future is dropped half way.
    pub async fn disconnect(&mut self) -> Result<(), ConnectError> {
        let Some(teardown) = self.teardown.take() else {
            return Ok(());
        };

        debug!(
            "Disconnecting {} tunnel for server {}",
            self.protocol, self.server_id
        );

        tokio::task::spawn_blocking(teardown)
            .await
            .map_err(|e| ConnectError::Teardown(e.to_string()))?
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &self.protocol)
            .field("server_id", &self.server_id)
            .field("established_in", &self.established_in)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };

        warn!(
            "Tearing down {} tunnel for server {} on drop",
            self.protocol, self.server_id
        );

        if let Err(e) = teardown() {
            error!(
                "Teardown of {} tunnel for server {} failed: {}",
                self.protocol, self.server_id, e
            );
        }
    }
}

/// Disconnect a connection that may not exist
pub async fn disconnect(connection: Option<&mut Connection>) -> Result<(), ConnectError> {
    match connection {
        Some(connection) => connection.disconnect().await,
        None => Ok(()),
    }
}
