use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// One VPN endpoint under test, as delivered by the job producer.
///
/// Every field is optional on the wire; an absent value reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub id: String,
    pub hostname: String,
    pub ip_address: String,
    pub wireguard_config: String,
    pub openvpn_config: String,
    pub openvpn_user: String,
    pub openvpn_password: String,
    pub wireguard_private_key: String,
}

/// Which measurements a job asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Connectivity and latency only
    Cold,
    /// Adds throughput
    Warm,
    /// Adds streaming unlock checks
    Hot,
}

impl Tier {
    pub fn measures_throughput(&self) -> bool {
        !matches!(self, Tier::Cold)
    }

    pub fn measures_streaming(&self) -> bool {
        matches!(self, Tier::Hot)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Cold => write!(f, "cold"),
            Tier::Warm => write!(f, "warm"),
            Tier::Hot => write!(f, "hot"),
        }
    }
}

/// A unit of work popped from the probe's queue.
///
/// `protocol` stays a plain string here: an unknown or absent protocol is
/// not a malformed job, it is reported back as a failed connection.
/// Absent and `null` read the same for everything but `server_id` and `tier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub server_id: i64,
    pub tier: Tier,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latency_targets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub streaming_targets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server: ServerConfig,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Job {
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload() {
        let job = Job::from_slice(
            br#"{
                "server_id": 42,
                "tier": "hot",
                "protocol": "openvpn-udp",
                "latency_targets": ["1.1.1.1", "https://example.com"],
                "streaming_targets": ["netflix-us"],
                "server": {
                    "id": "42",
                    "hostname": "de-fra-42.example.net",
                    "ip_address": "203.0.113.42",
                    "wireguard_config": "",
                    "openvpn_config": "client\ndev tun\n",
                    "openvpn_user": "user",
                    "openvpn_password": "pass",
                    "wireguard_private_key": ""
                }
            }"#,
        )
        .unwrap();

        assert_eq!(job.server_id, 42);
        assert_eq!(job.tier, Tier::Hot);
        assert_eq!(job.protocol, "openvpn-udp");
        assert_eq!(job.latency_targets.len(), 2);
        assert_eq!(job.server.hostname, "de-fra-42.example.net");
        assert_eq!(job.server.openvpn_user, "user");
    }

    #[test]
    fn test_sparse_payload() {
        let job = Job::from_slice(
            br#"{"server_id": 5, "tier": "cold", "protocol": "wireguard",
                 "server": {"id": "5", "wireguard_config": "[Interface]"}}"#,
        )
        .unwrap();

        assert!(job.latency_targets.is_empty());
        assert!(job.streaming_targets.is_empty());
        assert_eq!(job.server.id, "5");
        assert!(job.server.openvpn_config.is_empty());
    }

    #[test]
    fn test_malformed_payload() {
        assert!(Job::from_slice(b"not json").is_err());
        assert!(Job::from_slice(br#"{"server_id": "abc", "tier": "cold", "protocol": "wireguard"}"#).is_err());
        assert!(Job::from_slice(br#"{"server_id": 1, "tier": "lukewarm", "protocol": "wireguard"}"#).is_err());
    }

    #[test]
    fn test_null_lists_read_as_empty() {
        let job = Job::from_slice(
            br#"{"server_id": 5, "tier": "warm", "protocol": "wireguard",
                 "latency_targets": null, "streaming_targets": null, "server": null}"#,
        )
        .unwrap();

        assert!(job.latency_targets.is_empty());
        assert!(job.streaming_targets.is_empty());
        assert_eq!(job.server, ServerConfig::default());
    }

    #[test]
    fn test_missing_protocol_is_not_malformed() {
        let job = Job::from_slice(br#"{"server_id": 5, "tier": "cold", "server": {"id": "5"}}"#)
            .unwrap();
        assert_eq!(job.protocol, "");

        let job = Job::from_slice(br#"{"server_id": 5, "tier": "cold", "protocol": null}"#).unwrap();
        assert_eq!(job.protocol, "");
    }

    #[test]
    fn test_tier_gating() {
        assert!(!Tier::Cold.measures_throughput());
        assert!(!Tier::Cold.measures_streaming());
        assert!(Tier::Warm.measures_throughput());
        assert!(!Tier::Warm.measures_streaming());
        assert!(Tier::Hot.measures_throughput());
        assert!(Tier::Hot.measures_streaming());
    }
}
