use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid signing key: {0}")]
    SigningKey(String),

    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook failed: {status}")]
    Status { status: u16 },
}

impl ReportError {
    pub fn status(status: u16) -> Self {
        Self::Status { status }
    }
}
