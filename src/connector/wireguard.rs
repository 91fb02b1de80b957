use std::path::Path;

use crate::{errors::ConnectError, job::ServerConfig};

use super::{file_stem, path_arg, CommandSpec, Tunnel, TunnelFile, TunnelPlan};

/// `wg-quick` driven WireGuard tunnels
#[derive(Debug, Clone)]
pub struct WireGuard {
    wg_quick: String,
}

impl WireGuard {
    pub fn new(wg_quick: impl Into<String>) -> Self {
        Self {
            wg_quick: wg_quick.into(),
        }
    }
}

impl Tunnel for WireGuard {
    fn plan(&self, server: &ServerConfig, work_dir: &Path) -> Result<TunnelPlan, ConnectError> {
        if server.wireguard_config.trim().is_empty() {
            return Err(ConnectError::missing_config("WireGuard", &server.id));
        }

        let config_path = work_dir.join(format!("wg-{}.conf", file_stem(&server.id)));
        let contents = with_private_key(&server.wireguard_config, &server.wireguard_private_key);

        Ok(TunnelPlan {
            up: CommandSpec::new(&self.wg_quick, ["up".to_string(), path_arg(&config_path)]),
            down: CommandSpec::new(&self.wg_quick, ["down".to_string(), path_arg(&config_path)]),
            files: vec![TunnelFile {
                path: config_path,
                contents,
            }],
        })
    }
}

/// Add `PrivateKey = <key>` to the `[Interface]` section when the config
/// text does not carry one itself.
pub fn with_private_key(config: &str, private_key: &str) -> String {
    let private_key = private_key.trim();
    if private_key.is_empty() {
        return config.to_string();
    }

    let has_key = config.lines().any(|line| {
        line.trim_start()
            .split('=')
            .next()
            .is_some_and(|name| name.trim().eq_ignore_ascii_case("privatekey"))
    });
    if has_key {
        return config.to_string();
    }

    let mut injected = false;
    let mut out = String::with_capacity(config.len() + private_key.len() + 16);
    for line in config.lines() {
        out.push_str(line);
        out.push('\n');
        if !injected && line.trim().eq_ignore_ascii_case("[interface]") {
            out.push_str("PrivateKey = ");
            out.push_str(private_key);
            out.push('\n');
            injected = true;
        }
    }

    if injected {
        out
    } else {
        config.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "[Interface]\nAddress = 10.0.0.2/32\n\n[Peer]\nPublicKey = abc=\nEndpoint = 203.0.113.5:51820\n";

    #[test]
    fn test_plan() {
        let server = ServerConfig {
            id: "5".to_string(),
            wireguard_config: CONFIG.to_string(),
            ..Default::default()
        };

        let plan = WireGuard::new("wg-quick")
            .plan(&server, Path::new("/run/probe"))
            .unwrap();

        assert_eq!(plan.files.len(), 1);
        assert_eq!(plan.files[0].path, Path::new("/run/probe/wg-5.conf"));
        assert_eq!(plan.files[0].contents, CONFIG);
        assert_eq!(plan.up.to_string(), "wg-quick up /run/probe/wg-5.conf");
        assert_eq!(plan.down.to_string(), "wg-quick down /run/probe/wg-5.conf");
    }

    #[test]
    fn test_missing_config_names_server() {
        let server = ServerConfig {
            id: "77".to_string(),
            ..Default::default()
        };

        let err = WireGuard::new("wg-quick")
            .plan(&server, Path::new("/tmp"))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing WireGuard config for server 77");
    }

    #[test]
    fn test_private_key_injection() {
        let injected = with_private_key(CONFIG, "cHJpdmF0ZQ==");
        assert!(injected.starts_with("[Interface]\nPrivateKey = cHJpdmF0ZQ==\nAddress"));

        let with_key = "[Interface]\nPrivateKey = existing\n";
        assert_eq!(with_private_key(with_key, "other"), with_key);

        assert_eq!(with_private_key(CONFIG, "  "), CONFIG);
        assert_eq!(with_private_key("[Peer]\n", "key"), "[Peer]\n");
    }
}
