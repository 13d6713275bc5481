//! The line-delimited-JSON protocol spoken over the daemon's Unix socket.
//! One command per connection; one reply line per command.

use crate::types::ServiceStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A command sent by the manager to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DaemonCommand {
    /// Start supervising a `longrun` service.
    Add {
        /// Service name.
        name: String,
        /// Shell command to spawn. Named `run` on the wire since `command`
        /// is the message tag.
        run: String,
    },
    /// Stop and stop supervising a `longrun` service.
    Remove {
        /// Service name.
        name: String,
    },
    /// Report state for every supervised service.
    Status,
    /// Stop supervising everything and exit the daemon process.
    Shutdown,
}

/// A reply sent by the daemon for one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DaemonReply {
    /// `{"services": {...}}`, only sent for [`DaemonCommand::Status`].
    Status {
        /// Per-service state.
        services: BTreeMap<String, ServiceStatus>,
    },
    /// `{"ok": false, "error": "..."}`.
    Error {
        /// Always `false`.
        ok: bool,
        /// Human-readable failure reason.
        error: String,
    },
    /// `{"ok": true}`.
    Ok {
        /// Always `true`.
        ok: bool,
    },
}

impl DaemonReply {
    /// An `{"ok": true}` reply.
    #[must_use]
    pub fn ok() -> Self {
        Self::Ok { ok: true }
    }

    /// An `{"ok": false, "error": ...}` reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            ok: false,
            error: message.into(),
        }
    }

    /// A `{"services": {...}}` reply.
    #[must_use]
    pub fn status(services: BTreeMap<String, ServiceStatus>) -> Self {
        Self::Status { services }
    }

    /// Whether this reply represents a successful, non-status command.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { ok: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceState;

    #[test]
    fn add_command_wire_shape() {
        let cmd = DaemonCommand::Add {
            name: "trace".into(),
            run: "sleep 30".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json, serde_json::json!({"command": "add", "name": "trace", "run": "sleep 30"}));
        let back: DaemonCommand = serde_json::from_value(json).unwrap();
        assert!(matches!(back, DaemonCommand::Add { name, run } if name == "trace" && run == "sleep 30"));
    }

    #[test]
    fn bare_commands_have_no_extra_fields() {
        assert_eq!(
            serde_json::to_value(DaemonCommand::Shutdown).unwrap(),
            serde_json::json!({"command": "shutdown"})
        );
        assert_eq!(
            serde_json::to_value(DaemonCommand::Status).unwrap(),
            serde_json::json!({"command": "status"})
        );
    }

    #[test]
    fn reply_wire_shapes() {
        assert_eq!(serde_json::to_value(DaemonReply::ok()).unwrap(), serde_json::json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(DaemonReply::error("unknown service vector")).unwrap(),
            serde_json::json!({"ok": false, "error": "unknown service vector"})
        );

        let mut services = BTreeMap::new();
        services.insert(
            "trace".to_string(),
            ServiceStatus {
                state: ServiceState::Up,
                pid: Some(42),
            },
        );
        assert_eq!(
            serde_json::to_value(DaemonReply::status(services)).unwrap(),
            serde_json::json!({"services": {"trace": {"state": "up", "pid": 42}}})
        );
    }

    #[test]
    fn replies_parse_back_by_shape() {
        let ok: DaemonReply = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(ok.is_ok());
        let err: DaemonReply = serde_json::from_str(r#"{"ok": false, "error": "boom"}"#).unwrap();
        assert!(!err.is_ok());
        let status: DaemonReply = serde_json::from_str(r#"{"services": {}}"#).unwrap();
        assert!(matches!(status, DaemonReply::Status { .. }));
    }
}
