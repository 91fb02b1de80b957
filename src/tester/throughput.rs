use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Derived download/upload rates in Mbps
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

/// Convert a timed download into rates. Upload is not measured, it is a
/// fixed share of the download rate. `None` when no time elapsed.
pub fn compute_throughput(bytes: u64, elapsed: Duration, upload_ratio: f64) -> Option<Throughput> {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return None;
    }

    let download_mbps = bytes as f64 * 8.0 / seconds / 1_000_000.0;
    Some(Throughput {
        download_mbps,
        upload_mbps: download_mbps * upload_ratio,
    })
}

/// Single timed download of a fixed-size payload
#[derive(Debug, Clone)]
pub struct ThroughputProbe {
    client: Client,
    url: String,
    upload_ratio: f64,
}

impl ThroughputProbe {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        upload_ratio: f64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            upload_ratio,
        })
    }

    /// Failures never propagate: any error is logged and reported as no data
    pub async fn measure(&self) -> Option<Throughput> {
        let start = Instant::now();

        let mut response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Throughput request to {} failed: {}", self.url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Throughput request to {} returned {}",
                self.url,
                response.status()
            );
            return None;
        }

        let mut bytes: u64 = 0;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => bytes += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    warn!("Throughput download aborted after {} bytes: {}", bytes, e);
                    return None;
                }
            }
        }

        let elapsed = start.elapsed();
        debug!("Downloaded {} bytes in {:?}", bytes, elapsed);

        compute_throughput(bytes, elapsed, self.upload_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn test_zero_elapsed_never_divides() {
        assert_eq!(compute_throughput(0, Duration::ZERO, 0.3), None);
        assert_eq!(compute_throughput(10_000_000, Duration::ZERO, 0.3), None);
        assert_eq!(
            compute_throughput(0, Duration::from_secs(1), 0.3),
            Some(Throughput::default())
        );
    }

    #[test]
    fn test_rates() {
        let rates = compute_throughput(10_000_000, Duration::from_secs(2), 0.3).unwrap();
        assert!((rates.download_mbps - 40.0).abs() < 1e-9);
        assert!((rates.upload_mbps - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 256 * 1024])
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;

        let probe =
            ThroughputProbe::new(format!("{}/__down", server.uri()), Duration::from_secs(5), 0.3)
                .unwrap();
        let rates = probe.measure().await.unwrap();

        assert!(rates.download_mbps > 0.0);
        assert!((rates.upload_mbps - rates.download_mbps * 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_error_status_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let probe = ThroughputProbe::new(server.uri(), Duration::from_secs(5), 0.3).unwrap();
        assert_eq!(probe.measure().await, None);
    }

    #[tokio::test]
    async fn test_timeout_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let probe = ThroughputProbe::new(server.uri(), Duration::from_millis(100), 0.3).unwrap();
        assert_eq!(probe.measure().await, None);
    }
}
