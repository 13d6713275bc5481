//! Shared scaffolding for the fleet's CLI binaries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use tracing_subscriber::EnvFilter;

/// Exit code for usage or operational errors, per the CLI surface spec.
pub const EXIT_ERROR: i32 = 1;

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// defaulting to `info` for this crate's binaries when unset.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleet_cli=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
