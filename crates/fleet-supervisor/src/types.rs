//! Service declaration and the supervised state machine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a service is supervised once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Spawned once, monitored by the daemon until explicitly removed.
    Longrun,
    /// Run to completion synchronously on `start`/`stop`; never watched.
    Oneshot,
}

impl Default for ServiceType {
    fn default() -> Self {
        Self::Longrun
    }
}

/// One entry in a declared service list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Unique name used to address this service in commands.
    pub name: String,
    /// Shell command that starts a `longrun` service.
    #[serde(default)]
    pub command: String,
    /// `longrun` (default) or `oneshot`.
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,
    /// Command executed once on `start` for a `oneshot` service.
    #[serde(default)]
    pub up: Option<String>,
    /// Command executed once on `stop` for a `oneshot` service.
    #[serde(default)]
    pub down: Option<String>,
}

/// Observed state of a supervised `longrun` service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Running.
    Up,
    /// Explicitly removed or exited cleanly.
    Down,
    /// Exited unexpectedly or failed to spawn.
    Fail,
}

/// A service's reported state plus its OS pid, if currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Current state.
    pub state: ServiceState,
    /// Process id while `state == Up`.
    pub pid: Option<u32>,
}

/// Socket path for the daemon: `<root>/data/svscan.sock`.
#[must_use]
pub fn socket_path(root: &Path) -> PathBuf {
    root.join("data").join("svscan.sock")
}

/// PID file path for the daemon: `<root>/data/svscan.pid`.
#[must_use]
pub fn pid_path(root: &Path) -> PathBuf {
    root.join("data").join("svscan.pid")
}

/// Log file path for the daemon: `<root>/data/svscan.log`.
#[must_use]
pub fn log_path(root: &Path) -> PathBuf {
    root.join("data").join("svscan.log")
}
