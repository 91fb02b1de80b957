use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("Malformed job payload: {0}")]
    MalformedJob(#[from] serde_json::Error),
}
