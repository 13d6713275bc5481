//! CLI-facing manager: resolves start/stop ranges over a declared service
//! list, spawns the daemon on demand, and talks the line protocol to it.

use crate::daemon::{default_daemon_binary, is_running};
use crate::protocol::{DaemonCommand, DaemonReply};
use crate::types::{ServiceSpec, ServiceStatus, ServiceType, log_path, pid_path, socket_path};
use fleet_error::{ErrorCode, FleetError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Drives `start`/`stop`/`status`/`restart` over a declared, ordered
/// service list against one supervisor daemon.
pub struct Manager {
    services: Vec<ServiceSpec>,
    root: PathBuf,
    daemon_binary: PathBuf,
}

impl Manager {
    /// Build a manager over `services`, with daemon state rooted at
    /// `root` (socket/PID/log live under `<root>/data/`).
    pub fn new(services: Vec<ServiceSpec>, root: impl Into<PathBuf>) -> Self {
        Self {
            services,
            root: root.into(),
            daemon_binary: default_daemon_binary(),
        }
    }

    /// Override the `svscand` binary path used to spawn the daemon.
    #[must_use]
    pub fn with_daemon_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.daemon_binary = path.into();
        self
    }

    async fn daemon_running(&self) -> bool {
        is_running(&socket_path(&self.root)).await
    }

    async fn ensure_daemon_running(&self) -> Result<(), FleetError> {
        if self.daemon_running().await {
            return Ok(());
        }

        let socket = socket_path(&self.root);
        let pid = pid_path(&self.root);
        let log = log_path(&self.root);
        if let Some(parent) = socket.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::new(ErrorCode::Internal, format!("mkdir {}: {e}", parent.display())).with_source(e))?;
        }
        let log_file = std::fs::File::create(&log)
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("create {}: {e}", log.display())).with_source(e))?;
        let stderr_file = log_file
            .try_clone()
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("clone log handle: {e}")).with_source(e))?;

        tokio::process::Command::new(&self.daemon_binary)
            .arg("--socket")
            .arg(&socket)
            .arg("--pid-file")
            .arg(&pid)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("spawn daemon: {e}")).with_source(e))?;

        for _ in 0..50 {
            if self.daemon_running().await {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Err(FleetError::new(ErrorCode::Unavailable, "daemon did not become ready"))
    }

    async fn send(&self, command: &DaemonCommand) -> Result<DaemonReply, FleetError> {
        let socket = socket_path(&self.root);
        let stream = UnixStream::connect(&socket)
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("connect {}: {e}", socket.display())).with_source(e))?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_vec(command)
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("encode command: {e}")).with_source(e))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("send command: {e}")).with_source(e))?;

        let mut reply_line = String::new();
        BufReader::new(reader)
            .read_line(&mut reply_line)
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("read reply: {e}")).with_source(e))?;

        serde_json::from_str(reply_line.trim_end())
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("malformed reply: {e}")).with_source(e))
    }

    fn index_of(&self, name: &str) -> Result<usize, FleetError> {
        self.services
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| FleetError::invalid_argument(format!("unknown service {name}")))
    }

    /// Start all services (declared order) or, given `name`, every service
    /// up to and including it.
    pub async fn start(&self, name: Option<&str>) -> Result<(), FleetError> {
        let end = match name {
            None => self.services.len(),
            Some(name) => self.index_of(name)? + 1,
        };
        let targets = &self.services[..end];

        if targets.iter().any(|s| s.service_type == ServiceType::Longrun) {
            self.ensure_daemon_running().await?;
        }

        for spec in targets {
            match spec.service_type {
                ServiceType::Longrun => {
                    let command = DaemonCommand::Add {
                        name: spec.name.clone(),
                        run: spec.command.clone(),
                    };
                    match self.send(&command).await {
                        Ok(reply) if reply.is_ok() => {}
                        Ok(reply) => tracing::error!(service = %spec.name, ?reply, "add failed"),
                        Err(err) => tracing::error!(service = %spec.name, %err, "add failed"),
                    }
                }
                ServiceType::Oneshot => {
                    if let Some(up) = &spec.up {
                        if let Err(err) = run_shell(up).await {
                            tracing::error!(service = %spec.name, %err, "oneshot up failed");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Stop all services (reverse declared order) or, given `name`, every
    /// service from the end back to and including it. Leaves the daemon
    /// running unless stopping the full set.
    pub async fn stop(&self, name: Option<&str>) -> Result<(), FleetError> {
        let start = match name {
            None => 0,
            Some(name) => self.index_of(name)?,
        };

        if !self.daemon_running().await {
            tracing::info!("supervisor daemon not running");
            return Ok(());
        }

        let targets: Vec<&ServiceSpec> = self.services[start..].iter().rev().collect();

        for spec in &targets {
            match spec.service_type {
                ServiceType::Longrun => {
                    let command = DaemonCommand::Remove { name: spec.name.clone() };
                    match self.send(&command).await {
                        Ok(reply) if reply.is_ok() => {}
                        Ok(reply) => tracing::error!(service = %spec.name, ?reply, "remove failed"),
                        Err(err) => tracing::error!(service = %spec.name, %err, "remove failed"),
                    }
                }
                ServiceType::Oneshot => {
                    if let Some(down) = &spec.down {
                        if let Err(err) = run_shell(down).await {
                            tracing::error!(service = %spec.name, %err, "oneshot down failed");
                        }
                    }
                }
            }
        }

        if name.is_none() {
            let _ = self.send(&DaemonCommand::Shutdown).await;
        }
        Ok(())
    }

    /// `stop(name)` then `start(name)`.
    pub async fn restart(&self, name: Option<&str>) -> Result<(), FleetError> {
        self.stop(name).await?;
        self.start(name).await
    }

    /// Per-service state for all services, or just `name`. `None` means
    /// the daemon isn't running; callers should report that and exit
    /// cleanly rather than treating it as an error.
    pub async fn status(&self, name: Option<&str>) -> Result<Option<BTreeMap<String, ServiceStatus>>, FleetError> {
        if let Some(name) = name {
            self.index_of(name)?;
        }
        if !self.daemon_running().await {
            return Ok(None);
        }

        let reply = self.send(&DaemonCommand::Status).await?;
        let DaemonReply::Status { services } = reply else {
            return Err(FleetError::new(ErrorCode::Internal, "daemon sent a non-status reply to a status command"));
        };

        match name {
            None => Ok(Some(services)),
            Some(name) => {
                let mut single = BTreeMap::new();
                if let Some(status) = services.get(name) {
                    single.insert(name.to_string(), *status);
                }
                Ok(Some(single))
            }
        }
    }
}

async fn run_shell(command: &str) -> Result<(), FleetError> {
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .map_err(|e| FleetError::new(ErrorCode::Internal, format!("spawn `{command}`: {e}")).with_source(e))?;
    if status.success() {
        Ok(())
    } else {
        Err(FleetError::new(ErrorCode::Internal, format!("`{command}` exited with {status}")))
    }
}
