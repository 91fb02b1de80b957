//! Signed result delivery to the collector webhook.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Client};
use sha2::Sha256;
use tracing::debug;

use crate::{
    config::CollectorConfig,
    errors::{InitializationError, ReportError},
    result::TestResult,
    utils::now_millis,
};

pub const SIGNATURE_HEADER: &str = "X-Probe-Signature";
pub const PROBE_ID_HEADER: &str = "X-Probe-ID";

type HmacSha256 = Hmac<Sha256>;

/// Where finished results go. One attempt per result, no retry.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn send(&self, result: TestResult) -> Result<(), ReportError>;
}

pub struct WebhookReporter {
    client: Client,
    url: String,
    secret: String,
}

impl WebhookReporter {
    pub fn new(config: &CollectorConfig) -> Result<Self, InitializationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| InitializationError::http_client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        })
    }
}

#[async_trait]
impl ResultSink for WebhookReporter {
    async fn send(&self, mut result: TestResult) -> Result<(), ReportError> {
        result.timestamp = now_millis();

        let payload = serde_json::to_vec(&result)?;
        let signature = sign(&payload, &self.secret)?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(PROBE_ID_HEADER, result.probe_id.as_str())
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::status(status.as_u16()));
        }

        debug!("Result for server {} accepted ({})", result.server_id, status);
        Ok(())
    }
}

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`
pub fn sign(payload: &[u8], secret: &str) -> Result<String, ReportError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ReportError::SigningKey(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
