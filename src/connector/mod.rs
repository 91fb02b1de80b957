//! Tunnel establishment through external VPN tools.

mod command;
mod connection;
mod openvpn;
mod wireguard;

pub use command::CommandSpec;
pub use connection::{disconnect, Connection};
pub use openvpn::OpenVpn;
pub use wireguard::{with_private_key, WireGuard};

use std::{
    fmt,
    fs::Permissions,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use tokio::{
    fs::{DirBuilder, OpenOptions},
    io::AsyncWriteExt,
    sync::watch,
    time::Instant,
};
use tracing::{debug, info};

use crate::{config::ConnectorConfig, errors::ConnectError, job::ServerConfig};

/// Supported tunneling protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    WireGuard,
    OpenVpn,
}

impl FromStr for Protocol {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wireguard" => Ok(Protocol::WireGuard),
            "openvpn" | "openvpn-udp" | "openvpn-tcp" => Ok(Protocol::OpenVpn),
            other => Err(ConnectError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::WireGuard => write!(f, "wireguard"),
            Protocol::OpenVpn => write!(f, "openvpn"),
        }
    }
}

/// A file the tunnel tool reads, written with owner-only permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Everything needed to bring one server's tunnel up and down again
#[derive(Debug, Clone)]
pub struct TunnelPlan {
    pub files: Vec<TunnelFile>,
    pub up: CommandSpec,
    pub down: CommandSpec,
}

/// One tunneling protocol. Paths in the plan depend only on the server id,
/// so teardown always finds the tunnel that was brought up.
pub trait Tunnel: Send + Sync {
    fn plan(&self, server: &ServerConfig, work_dir: &Path) -> Result<TunnelPlan, ConnectError>;
}

pub struct Connector {
    work_dir: PathBuf,
    dry_run: bool,
    wireguard: WireGuard,
    openvpn: OpenVpn,
}

impl Connector {
    pub fn new(config: &ConnectorConfig, dry_run: bool) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            dry_run,
            wireguard: WireGuard::new(&config.wg_quick_bin),
            openvpn: OpenVpn::new(&config.openvpn_bin, &config.pkill_bin),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn tunnel(&self, protocol: Protocol) -> &dyn Tunnel {
        match protocol {
            Protocol::WireGuard => &self.wireguard,
            Protocol::OpenVpn => &self.openvpn,
        }
    }

    /// Establish a tunnel to `server`.
    ///
    /// On error nothing needs tearing down; config files already written are
    /// left in the work directory. The up command is killed if `shutdown`
    /// fires while it runs.
    pub async fn connect(
        &self,
        server: &ServerConfig,
        protocol: &str,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Connection, ConnectError> {
        let protocol: Protocol = protocol.parse()?;
        let plan = self.tunnel(protocol).plan(server, &self.work_dir)?;

        ensure_work_dir(&self.work_dir, protocol).await?;
        for file in &plan.files {
            write_private(file, protocol).await?;
        }

        if self.dry_run {
            info!("Dry run, skipping {}", plan.up);
            return Ok(Connection::new(protocol, &server.id, Duration::ZERO, || Ok(())));
        }

        let start = Instant::now();
        plan.up.run(shutdown).await?;
        let established_in = start.elapsed();

        info!(
            "{} tunnel to server {} up in {:?}",
            protocol, server.id, established_in
        );

        let TunnelPlan { files, down, .. } = plan;
        Ok(Connection::new(
            protocol,
            &server.id,
            established_in,
            move || {
                down.run_blocking()?;
                for file in files {
                    if let Err(e) = std::fs::remove_file(&file.path) {
                        debug!("Could not remove {}: {}", file.path.display(), e);
                    }
                }
                Ok(())
            },
        ))
    }
}

fn label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::WireGuard => "wireguard",
        Protocol::OpenVpn => "openvpn",
    }
}

/// Create the work directory owner-only if it is missing (e.g. on a fresh tmpfs)
async fn ensure_work_dir(dir: &Path, protocol: Protocol) -> Result<(), ConnectError> {
    let wrap = |source| ConnectError::WriteConfig {
        protocol: label(protocol),
        path: dir.to_path_buf(),
        source,
    };

    if tokio::fs::try_exists(dir).await.map_err(wrap)? {
        return Ok(());
    }

    debug!("Creating work directory {}", dir.display());
    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .await
        .map_err(wrap)?;

    // mode() is subject to the umask
    tokio::fs::set_permissions(dir, Permissions::from_mode(0o700))
        .await
        .map_err(wrap)
}

async fn write_private(file: &TunnelFile, protocol: Protocol) -> Result<(), ConnectError> {
    let label = label(protocol);
    let wrap = |source| ConnectError::WriteConfig {
        protocol: label,
        path: file.path.clone(),
        source,
    };

    let mut handle = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&file.path)
        .await
        .map_err(wrap)?;

    // mode() only applies on creation
    tokio::fs::set_permissions(&file.path, Permissions::from_mode(0o600))
        .await
        .map_err(wrap)?;

    handle
        .write_all(file.contents.as_bytes())
        .await
        .map_err(wrap)?;
    handle.flush().await.map_err(wrap)?;

    Ok(())
}

/// Server ids end up in file names; keep them to a safe alphabet
pub(crate) fn file_stem(server_id: &str) -> String {
    server_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt};
    use tempfile::{tempdir, TempDir};

    const WG_CONFIG: &str = "[Interface]\nAddress = 10.0.0.2/32\n";

    fn wireguard_server(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            wireguard_config: WG_CONFIG.to_string(),
            ..Default::default()
        }
    }

    fn connector_config(dir: &TempDir) -> ConnectorConfig {
        ConnectorConfig {
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    /// A stand-in tunnel tool that appends its arguments to `calls.log`
    fn fake_tool(dir: &TempDir, name: &str, exit_code: i32) -> String {
        let log = dir.path().join("calls.log");
        let script = dir.path().join(name);
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\nexit {}\n",
                log.display(),
                exit_code
            ),
        )
        .unwrap();
        fs::set_permissions(&script, Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    fn calls(dir: &TempDir) -> Vec<String> {
        fs::read_to_string(dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("wireguard".parse::<Protocol>().unwrap(), Protocol::WireGuard);
        for name in ["openvpn", "openvpn-udp", "openvpn-tcp"] {
            assert_eq!(name.parse::<Protocol>().unwrap(), Protocol::OpenVpn);
        }
        assert!("WireGuard".parse::<Protocol>().is_err());
        assert!("ipsec".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("5"), "5");
        assert_eq!(file_stem("de-fra_01"), "de-fra_01");
        assert_eq!(file_stem("../../etc/passwd"), "______etc_passwd");
    }

    #[tokio::test]
    async fn test_unsupported_protocol_has_no_side_effects() {
        let dir = tempdir().unwrap();
        let mut config = connector_config(&dir);
        config.wg_quick_bin = fake_tool(&dir, "wg-quick", 0);
        let (_tx, rx) = watch::channel(false);

        let err = Connector::new(&config, false)
            .connect(&wireguard_server("5"), "ipsec", &rx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unsupported protocol: ipsec");
        assert!(calls(&dir).is_empty());
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("wg-quick")]);
    }

    #[tokio::test]
    async fn test_missing_config_fails_fast() {
        let dir = tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);

        let server = ServerConfig {
            id: "31".to_string(),
            ..Default::default()
        };
        let err = Connector::new(&connector_config(&dir), true)
            .connect(&server, "openvpn", &rx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("server 31"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run() {
        let dir = tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);

        let connector = Connector::new(&connector_config(&dir), true);
        let mut connection = connector
            .connect(&wireguard_server("5"), "wireguard", &rx)
            .await
            .unwrap();

        assert_eq!(connection.connection_time_ms(), 0);
        assert_eq!(connection.protocol(), Protocol::WireGuard);

        let path = dir.path().join("wg-5.conf");
        assert_eq!(fs::read_to_string(&path).unwrap(), WG_CONFIG);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_work_dir_is_created() {
        let dir = tempdir().unwrap();
        let work_dir = dir.path().join("run").join("vpn-probe");
        let config = ConnectorConfig {
            work_dir: work_dir.clone(),
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(false);

        Connector::new(&config, true)
            .connect(&wireguard_server("5"), "wireguard", &rx)
            .await
            .unwrap();

        assert!(work_dir.join("wg-5.conf").exists());
        let mode = fs::metadata(&work_dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_existing_work_dir_keeps_its_mode() {
        let dir = tempdir().unwrap();
        fs::set_permissions(dir.path(), Permissions::from_mode(0o755)).unwrap();
        let (_tx, rx) = watch::channel(false);

        Connector::new(&connector_config(&dir), true)
            .connect(&wireguard_server("5"), "wireguard", &rx)
            .await
            .unwrap();

        let mode = fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_up_and_down() {
        let dir = tempdir().unwrap();
        let mut config = connector_config(&dir);
        config.wg_quick_bin = fake_tool(&dir, "wg-quick", 0);
        let (_tx, rx) = watch::channel(false);

        let mut connection = Connector::new(&config, false)
            .connect(&wireguard_server("5"), "wireguard", &rx)
            .await
            .unwrap();

        let path = dir.path().join("wg-5.conf");
        assert_eq!(calls(&dir), vec![format!("up {}", path.display())]);

        connection.disconnect().await.unwrap();
        connection.disconnect().await.unwrap();
        drop(connection);

        assert_eq!(
            calls(&dir),
            vec![
                format!("up {}", path.display()),
                format!("down {}", path.display())
            ]
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_up_returns_no_connection() {
        let dir = tempdir().unwrap();
        let mut config = connector_config(&dir);
        config.wg_quick_bin = fake_tool(&dir, "wg-quick", 1);
        let (_tx, rx) = watch::channel(false);

        let err = Connector::new(&config, false)
            .connect(&wireguard_server("5"), "wireguard", &rx)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::CommandFailed { .. }));
        assert_eq!(calls(&dir).len(), 1);
    }

    #[tokio::test]
    async fn test_openvpn_teardown_on_drop() {
        let dir = tempdir().unwrap();
        let mut config = connector_config(&dir);
        config.openvpn_bin = fake_tool(&dir, "openvpn", 0);
        config.pkill_bin = fake_tool(&dir, "pkill", 0);
        let (_tx, rx) = watch::channel(false);

        let server = ServerConfig {
            id: "12".to_string(),
            openvpn_config: "client\n".to_string(),
            openvpn_user: "probe".to_string(),
            openvpn_password: "hunter2".to_string(),
            ..Default::default()
        };

        let connection = Connector::new(&config, false)
            .connect(&server, "openvpn-tcp", &rx)
            .await
            .unwrap();

        let auth = dir.path().join("ovpn-12.auth");
        assert_eq!(fs::read_to_string(&auth).unwrap(), "probe\nhunter2\n");
        assert_eq!(
            fs::metadata(&auth).unwrap().permissions().mode() & 0o777,
            0o600
        );

        drop(connection);

        let config_path = dir.path().join("ovpn-12.ovpn");
        assert_eq!(
            calls(&dir),
            vec![
                format!(
                    "--config {} --daemon --auth-user-pass {}",
                    config_path.display(),
                    auth.display()
                ),
                format!("-f {}", config_path.display()),
            ]
        );
        assert!(!auth.exists());
    }
}
