//! HTTP/2 keepalive tuning shared by server and client construction.

use std::time::Duration;

/// Keepalive parameters applied to both the server listener and the client
/// transport.
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveConfig {
    /// Interval between HTTP/2 pings on an idle connection.
    pub ping_interval: Duration,
    /// How long to wait for a ping ack before the peer is presumed dead.
    pub ping_ack_timeout: Duration,
    /// Minimum spacing between pings even under load.
    pub min_time_between_pings: Duration,
    /// Whether pings are sent on connections with no active calls.
    pub permit_without_calls: bool,
    /// How many pings may be sent without data frames in between;
    /// `0` means unlimited.
    pub max_pings_without_data: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            ping_ack_timeout: Duration::from_secs(10),
            min_time_between_pings: Duration::from_secs(10),
            permit_without_calls: true,
            max_pings_without_data: 0,
        }
    }
}
