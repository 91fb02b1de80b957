use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Enable the health endpoint
    pub enabled: bool,
    /// HTTP server address
    pub bind_addr: String,
    /// HTTP server port
    pub bind_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 8080,
        }
    }
}
