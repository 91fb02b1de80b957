use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Logging initialization error: {0}")]
    Logging(String),

    #[error("Queue client initialization error: {0}")]
    Queue(String),

    #[error("HTTP client initialization error: {0}")]
    HttpClient(String),

    #[error("Health server error: {0}")]
    HealthServer(String),
}

impl InitializationError {
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn http_client(msg: impl Into<String>) -> Self {
        Self::HttpClient(msg.into())
    }

    pub fn health_server(msg: impl Into<String>) -> Self {
        Self::HealthServer(msg.into())
    }
}
