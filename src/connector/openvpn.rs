use std::path::Path;

use crate::{errors::ConnectError, job::ServerConfig};

use super::{file_stem, path_arg, CommandSpec, Tunnel, TunnelFile, TunnelPlan};

/// Daemonized `openvpn` client tunnels, stopped with `pkill -f <config>`
#[derive(Debug, Clone)]
pub struct OpenVpn {
    openvpn: String,
    pkill: String,
}

impl OpenVpn {
    pub fn new(openvpn: impl Into<String>, pkill: impl Into<String>) -> Self {
        Self {
            openvpn: openvpn.into(),
            pkill: pkill.into(),
        }
    }
}

impl Tunnel for OpenVpn {
    fn plan(&self, server: &ServerConfig, work_dir: &Path) -> Result<TunnelPlan, ConnectError> {
        if server.openvpn_config.trim().is_empty() {
            return Err(ConnectError::missing_config("OpenVPN", &server.id));
        }

        let stem = file_stem(&server.id);
        let config_path = work_dir.join(format!("ovpn-{}.ovpn", stem));

        let mut up_args = vec![
            "--config".to_string(),
            path_arg(&config_path),
            "--daemon".to_string(),
        ];
        let mut files = vec![TunnelFile {
            path: config_path.clone(),
            contents: server.openvpn_config.clone(),
        }];

        if !server.openvpn_user.is_empty() && !server.openvpn_password.is_empty() {
            let auth_path = work_dir.join(format!("ovpn-{}.auth", stem));
            up_args.push("--auth-user-pass".to_string());
            up_args.push(path_arg(&auth_path));
            files.push(TunnelFile {
                path: auth_path,
                contents: format!("{}\n{}\n", server.openvpn_user, server.openvpn_password),
            });
        }

        Ok(TunnelPlan {
            up: CommandSpec::new(&self.openvpn, up_args),
            down: CommandSpec::new(&self.pkill, ["-f".to_string(), path_arg(&config_path)]),
            files,
        })
    }
}
