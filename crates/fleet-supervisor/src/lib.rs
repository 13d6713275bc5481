//! Process supervision for the agent fleet runtime: a daemon that holds
//! one child per `longrun` service behind a Unix socket, and a manager
//! that drives ordered start/stop/status/restart over a declared list.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod daemon;
mod manager;
mod protocol;
mod types;

pub use daemon::{Daemon, default_daemon_binary, is_running};
pub use manager::Manager;
pub use protocol::{DaemonCommand, DaemonReply};
pub use types::{ServiceSpec, ServiceState, ServiceStatus, ServiceType, log_path, pid_path, socket_path};
