//! Job intake from the per-probe Redis list.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    config::QueueConfig,
    errors::{InitializationError, QueueError},
    job::Job,
};

/// Where jobs come from.
///
/// `Ok(None)` means the queue is empty. A job is removed from the queue as
/// it is returned, so a malformed payload is lost.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn next_job(&self) -> Result<Option<Job>, QueueError>;
}

pub struct RedisJobQueue {
    client: Client,
    key: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisJobQueue {
    /// Parses the URL only; the connection is made on the first poll.
    pub fn new(config: &QueueConfig, probe_id: &str) -> Result<Self, InitializationError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| InitializationError::queue(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            key: config.key_for(probe_id),
            connection: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        debug!("Connecting to redis for {}", self.key);
        let connection = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn forget_connection(&self) {
        self.connection.lock().await.take();
    }
}

#[async_trait]
impl JobSource for RedisJobQueue {
    async fn next_job(&self) -> Result<Option<Job>, QueueError> {
        let mut connection = self.connection().await?;

        let payload: Option<Vec<u8>> = match connection.lpop(&self.key, None).await {
            Ok(payload) => payload,
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    warn!("Redis connection lost, reconnecting on next poll");
                    self.forget_connection().await;
                }
                return Err(e.into());
            }
        };

        decode_job(payload)
    }
}

pub(crate) fn decode_job(payload: Option<Vec<u8>>) -> Result<Option<Job>, QueueError> {
    match payload {
        None => Ok(None),
        Some(bytes) => Ok(Some(Job::from_slice(&bytes)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Tier;

    #[test]
    fn test_key_per_probe() {
        let config = QueueConfig {
            url: "redis://127.0.0.1:6379/0".to_string(),
            ..Default::default()
        };
        let queue = RedisJobQueue::new(&config, "fra-01").unwrap();
        assert_eq!(queue.key(), "probe:jobs:fra-01");
    }

    #[test]
    fn test_invalid_url() {
        let config = QueueConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RedisJobQueue::new(&config, "fra-01"),
            Err(InitializationError::Queue(_))
        ));
    }

    #[test]
    fn test_decode() {
        assert!(decode_job(None).unwrap().is_none());

        let job = decode_job(Some(
            br#"{"server_id": 9, "tier": "warm", "protocol": "wireguard"}"#.to_vec(),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(job.server_id, 9);
        assert_eq!(job.tier, Tier::Warm);

        let err = decode_job(Some(b"{\"server_id\":".to_vec())).unwrap_err();
        assert!(matches!(err, QueueError::MalformedJob(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        let config = QueueConfig {
            url: "redis://127.0.0.1:1/0".to_string(),
            ..Default::default()
        };
        let queue = RedisJobQueue::new(&config, "fra-01").unwrap();

        let err = queue.next_job().await.unwrap_err();
        assert!(matches!(err, QueueError::Transport(_)));
    }
}
