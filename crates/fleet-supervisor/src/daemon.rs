//! The long-running supervisor process: holds one child per `longrun`
//! service, answers commands over a Unix socket, and shuts itself down
//! cleanly on `shutdown` or SIGTERM.

use crate::protocol::{DaemonCommand, DaemonReply};
use crate::types::{ServiceState, ServiceStatus};
use fleet_error::{ErrorCode, FleetError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::process::{Child, Command};
use tokio::sync::{Notify, RwLock};

struct Supervised {
    pid: Option<u32>,
    state: Arc<RwLock<ServiceState>>,
    child: Arc<tokio::sync::Mutex<Child>>,
}

/// Holds every `longrun` service this daemon process currently supervises.
#[derive(Default)]
pub struct Daemon {
    services: RwLock<BTreeMap<String, Supervised>>,
}

impl Daemon {
    /// An empty daemon, supervising nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `command` under `name` and start watching it. Re-adding an
    /// already-running name is a no-op; the existing process is left alone.
    pub async fn add(&self, name: String, command: String) -> Result<(), FleetError> {
        {
            let services = self.services.read().await;
            if services.contains_key(&name) {
                return Ok(());
            }
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("spawn {name} failed: {e}")).with_source(e))?;

        let pid = child.id();
        let state = Arc::new(RwLock::new(ServiceState::Up));
        let child = Arc::new(tokio::sync::Mutex::new(child));

        self.services.write().await.insert(
            name.clone(),
            Supervised {
                pid,
                state: state.clone(),
                child: child.clone(),
            },
        );

        tokio::spawn(async move {
            let exit = child.lock().await.wait().await;
            let mut state = state.write().await;
            if *state == ServiceState::Up {
                *state = match exit {
                    Ok(status) if status.success() => ServiceState::Down,
                    _ => ServiceState::Fail,
                };
            }
        });

        Ok(())
    }

    /// Kill and stop watching `name`. Errors if `name` was never added.
    pub async fn remove(&self, name: &str) -> Result<(), FleetError> {
        let removed = self.services.write().await.remove(name);
        let Some(supervised) = removed else {
            return Err(FleetError::not_found(format!("unknown service {name}")));
        };
        let _ = supervised.child.lock().await.kill().await;
        *supervised.state.write().await = ServiceState::Down;
        Ok(())
    }

    /// Snapshot state + pid for every supervised service.
    pub async fn status(&self) -> BTreeMap<String, ServiceStatus> {
        let services = self.services.read().await;
        let mut out = BTreeMap::new();
        for (name, supervised) in services.iter() {
            let state = *supervised.state.read().await;
            let pid = if state == ServiceState::Up { supervised.pid } else { None };
            out.insert(name.clone(), ServiceStatus { state, pid });
        }
        out
    }

    async fn dispatch(&self, command: DaemonCommand) -> (DaemonReply, bool) {
        match command {
            DaemonCommand::Add { name, run } => match self.add(name, run).await {
                Ok(()) => (DaemonReply::ok(), false),
                Err(err) => (DaemonReply::error(err.message), false),
            },
            DaemonCommand::Remove { name } => match self.remove(&name).await {
                Ok(()) => (DaemonReply::ok(), false),
                Err(err) => (DaemonReply::error(err.message), false),
            },
            DaemonCommand::Status => (DaemonReply::status(self.status().await), false),
            DaemonCommand::Shutdown => (DaemonReply::ok(), true),
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: UnixStream, shutdown: Arc<Notify>) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
            return;
        }

        let reply = match serde_json::from_str::<DaemonCommand>(line.trim_end()) {
            Ok(command) => {
                let (reply, should_shutdown) = self.dispatch(command).await;
                if should_shutdown {
                    shutdown.notify_one();
                }
                reply
            }
            Err(err) => DaemonReply::error(format!("malformed command: {err}")),
        };

        if let Ok(mut bytes) = serde_json::to_vec(&reply) {
            bytes.push(b'\n');
            let _ = writer.write_all(&bytes).await;
        }
    }

    /// Bind `socket_path`, write `pid_path`, and serve commands until a
    /// `shutdown` command arrives or `external_shutdown` resolves.
    /// Removes both files before returning.
    pub async fn run(
        self: Arc<Self>,
        socket_path: &Path,
        pid_path: &Path,
        external_shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), FleetError> {
        if let Some(parent) = socket_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::new(ErrorCode::Internal, format!("mkdir {}: {e}", parent.display())).with_source(e))?;
        }
        let _ = tokio::fs::remove_file(socket_path).await;

        let listener = UnixListener::bind(socket_path)
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("bind {}: {e}", socket_path.display())).with_source(e))?;

        tokio::fs::write(pid_path, std::process::id().to_string())
            .await
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("write {}: {e}", pid_path.display())).with_source(e))?;

        let shutdown = Arc::new(Notify::new());
        tokio::pin!(external_shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let this = self.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(this.handle_connection(stream, shutdown));
                        }
                        Err(err) => tracing::error!(%err, "accept failed"),
                    }
                }
                () = shutdown.notified() => break,
                () = &mut external_shutdown => break,
            }
        }

        let _ = tokio::fs::remove_file(socket_path).await;
        let _ = tokio::fs::remove_file(pid_path).await;
        Ok(())
    }
}

/// `true` if a socket is live at `path` (connect-and-drop probe).
pub async fn is_running(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}

/// Path to the `svscand` binary this manager spawns, assumed to sit next
/// to the current executable.
#[must_use]
pub fn default_daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("svscand")))
        .unwrap_or_else(|| PathBuf::from("svscand"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_status_reports_up() {
        let daemon = Daemon::new();
        daemon.add("sleeper".into(), "sleep 5".into()).await.unwrap();
        let status = daemon.status().await;
        assert_eq!(status["sleeper"].state, ServiceState::Up);
        assert!(status["sleeper"].pid.is_some());
        daemon.remove("sleeper").await.unwrap();
    }

    #[tokio::test]
    async fn remove_unknown_service_is_not_found() {
        let daemon = Daemon::new();
        let err = daemon.remove("nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn remove_forgets_the_service_entirely() {
        let daemon = Daemon::new();
        daemon.add("sleeper".into(), "sleep 5".into()).await.unwrap();
        daemon.remove("sleeper").await.unwrap();
        assert!(daemon.status().await.get("sleeper").is_none());
    }
}
