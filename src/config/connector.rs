use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory for generated tunnel config files
    pub work_dir: PathBuf,
    pub wg_quick_bin: String,
    pub openvpn_bin: String,
    /// Used to stop daemonized openvpn instances
    pub pkill_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            wg_quick_bin: "wg-quick".to_string(),
            openvpn_bin: "openvpn".to_string(),
            pkill_bin: "pkill".to_string(),
        }
    }
}
