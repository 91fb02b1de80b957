use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use tokio::{
    net::TcpStream,
    time::{timeout, Instant},
};
use tracing::debug;

const DEFAULT_PORT: u16 = 443;

/// Outcome of a latency run. `best` is `None` when no target answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyReport {
    pub best: Option<Duration>,
    pub jitter: Option<Duration>,
    pub packet_loss_pct: f64,
}

/// Timed TCP connects against host:port targets
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    timeout: Duration,
    samples_per_target: u32,
}

impl LatencyProbe {
    pub fn new(timeout: Duration, samples_per_target: u32) -> Self {
        Self {
            timeout,
            samples_per_target: samples_per_target.max(1),
        }
    }

    pub async fn measure(&self, targets: &[String]) -> LatencyReport {
        let mut attempts = 0u32;
        let mut failures = 0u32;
        let mut best: Option<(Duration, Vec<Duration>)> = None;

        for target in targets {
            let Some(addr) = normalize_target(target) else {
                debug!("Skipping empty latency target");
                continue;
            };

            let mut samples = Vec::with_capacity(self.samples_per_target as usize);
            for _ in 0..self.samples_per_target {
                attempts += 1;
                match self.connect_once(&addr).await {
                    Some(rtt) => samples.push(rtt),
                    None => failures += 1,
                }
            }

            let Some(fastest) = samples.iter().min().copied() else {
                continue;
            };

            debug!("Latency to {}: {:?}", addr, fastest);
            if best.as_ref().map_or(true, |(current, _)| fastest < *current) {
                best = Some((fastest, samples));
            }
        }

        let packet_loss_pct = if attempts == 0 {
            0.0
        } else {
            f64::from(failures) * 100.0 / f64::from(attempts)
        };

        match best {
            Some((fastest, samples)) => LatencyReport {
                best: Some(fastest),
                jitter: jitter(&samples),
                packet_loss_pct,
            },
            None => LatencyReport {
                best: None,
                jitter: None,
                packet_loss_pct,
            },
        }
    }

    async fn connect_once(&self, addr: &str) -> Option<Duration> {
        let start = Instant::now();

        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                drop(stream);
                Some(elapsed)
            }
            Ok(Err(e)) => {
                debug!("Latency connect to {} failed: {}", addr, e);
                None
            }
            Err(_) => {
                debug!("Latency connect to {} timed out after {:?}", addr, self.timeout);
                None
            }
        }
    }
}

/// Turn a latency target into something `TcpStream::connect` accepts.
///
/// URLs lose their scheme, credentials and path; a missing port becomes 443.
pub fn normalize_target(target: &str) -> Option<String> {
    let mut host = target.trim();
    if host.is_empty() {
        return None;
    }

    if let Some(rest) = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
    {
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        if authority.is_empty() {
            return None;
        }
        host = authority;
    }

    if host.parse::<SocketAddr>().is_ok() {
        return Some(host.to_string());
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, DEFAULT_PORT).to_string());
    }
    if host.starts_with('[') && host.ends_with(']') {
        return Some(format!("{}:{}", host, DEFAULT_PORT));
    }
    if host.contains(':') {
        return Some(host.to_string());
    }

    Some(format!("{}:{}", host, DEFAULT_PORT))
}

/// Mean absolute difference between consecutive samples
fn jitter(samples: &[Duration]) -> Option<Duration> {
    if samples.len() < 2 {
        return None;
    }

    let total: Duration = samples
        .windows(2)
        .map(|pair| pair[0].abs_diff(pair[1]))
        .sum();

    Some(total / (samples.len() as u32 - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn refused_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("1.1.1.1").as_deref(), Some("1.1.1.1:443"));
        assert_eq!(normalize_target("1.2.3.4:1").as_deref(), Some("1.2.3.4:1"));
        assert_eq!(normalize_target(" example.com ").as_deref(), Some("example.com:443"));
        assert_eq!(normalize_target("example.com:8443").as_deref(), Some("example.com:8443"));
        assert_eq!(
            normalize_target("https://example.com/speed?x=1").as_deref(),
            Some("example.com:443")
        );
        assert_eq!(
            normalize_target("http://user:pw@example.com:8080/").as_deref(),
            Some("example.com:8080")
        );
        assert_eq!(normalize_target("http://example.com").as_deref(), Some("example.com:443"));
        assert_eq!(normalize_target("::1").as_deref(), Some("[::1]:443"));
        assert_eq!(normalize_target("[::1]:8443").as_deref(), Some("[::1]:8443"));
        assert_eq!(normalize_target("[2001:db8::1]").as_deref(), Some("[2001:db8::1]:443"));
        assert_eq!(normalize_target("   "), None);
        assert_eq!(normalize_target("https://"), None);
    }

    #[test]
    fn test_jitter() {
        assert_eq!(jitter(&[]), None);
        assert_eq!(jitter(&[Duration::from_millis(10)]), None);
        assert_eq!(
            jitter(&[
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(14),
            ]),
            Some(Duration::from_millis(8))
        );
    }

    #[tokio::test]
    async fn test_no_targets_is_no_data() {
        let probe = LatencyProbe::new(Duration::from_millis(200), 1);
        let report = probe.measure(&[]).await;
        assert_eq!(report, LatencyReport::default());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_no_data() {
        let probe = LatencyProbe::new(Duration::from_millis(500), 1);
        let report = probe.measure(&[refused_addr().await]).await;

        assert_eq!(report.best, None);
        assert_eq!(report.jitter, None);
        assert_eq!(report.packet_loss_pct, 100.0);
    }

    #[tokio::test]
    async fn test_reachable_target_wins_over_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let reachable = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let probe = LatencyProbe::new(Duration::from_millis(500), 2);
        let targets = vec![refused_addr().await, reachable, "   ".to_string()];
        let report = probe.measure(&targets).await;

        assert!(report.best.is_some());
        assert!(report.best.unwrap() < Duration::from_millis(500));
        assert!(report.jitter.is_some());
        assert_eq!(report.packet_loss_pct, 50.0);

        accept.abort();
    }
}
