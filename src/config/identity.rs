use serde::{Deserialize, Serialize};

/// Who this probe is and whether it touches real tunnels
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Probe identifier, also the suffix of the job queue key
    #[serde(default)]
    pub id: String,

    /// Skip tunnel tools and simulate connections
    #[serde(default)]
    pub dry_run: bool,
}
