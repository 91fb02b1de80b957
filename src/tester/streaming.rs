use std::{collections::HashMap, time::Duration};

use reqwest::{header::LOCATION, redirect::Policy, Client, StatusCode};
use tokio::time::Instant;
use tracing::debug;

use crate::result::{duration_ms, StreamingResult};

/// Platforms the probe knows how to check, with their reference pages
pub const PLATFORMS: [(&str, &str); 5] = [
    ("netflix-us", "https://www.netflix.com/title/80018499"),
    ("netflix-jp", "https://www.netflix.com/jp/title/80018499"),
    ("disney-plus", "https://www.disneyplus.com/"),
    ("hbo-max", "https://www.max.com/"),
    ("bbc-iplayer", "https://www.bbc.co.uk/iplayer"),
];

/// Unlock heuristic. Redirects are not followed, so a geo-block usually
/// shows up as a non-200 status.
pub fn is_unlocked(platform: &str, status: StatusCode, location: Option<&str>) -> bool {
    match platform {
        "bbc-iplayer" => {
            status == StatusCode::OK && !location.unwrap_or_default().contains("unavailable")
        }
        _ => status == StatusCode::OK,
    }
}

#[derive(Debug, Clone)]
pub struct StreamingProbe {
    client: Client,
    endpoints: HashMap<String, String>,
}

impl StreamingProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_endpoints(
            timeout,
            PLATFORMS
                .iter()
                .map(|(platform, url)| (platform.to_string(), url.to_string())),
        )
    }

    pub fn with_endpoints(
        timeout: Duration,
        endpoints: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            endpoints: endpoints.into_iter().collect(),
        })
    }

    /// One GET per known platform, in request order. Unknown platforms are
    /// skipped; a failed request marks only its own platform as locked.
    pub async fn check(&self, platforms: &[String]) -> Vec<StreamingResult> {
        let mut results = Vec::with_capacity(platforms.len());

        for platform in platforms {
            let Some(url) = self.endpoints.get(platform) else {
                debug!("Skipping unknown streaming platform {}", platform);
                continue;
            };

            let start = Instant::now();
            let response = self.client.get(url).send().await;
            let response_ms = duration_ms(start.elapsed());

            let is_unlocked = match response {
                Ok(response) => {
                    let location = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|value| value.to_str().ok());
                    is_unlocked(platform, response.status(), location)
                }
                Err(e) => {
                    debug!("Streaming check for {} failed: {}", platform, e);
                    false
                }
            };

            debug!(
                "Streaming {}: unlocked={} in {}ms",
                platform, is_unlocked, response_ms
            );

            results.push(StreamingResult {
                platform: platform.clone(),
                is_unlocked,
                response_ms,
            });
        }

        results
    }
}
