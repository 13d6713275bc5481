//! The supervisor daemon process. Binds a Unix socket, serves commands
//! from `fleet-supervisor`'s manager, and exits on `shutdown` or SIGTERM.

use clap::Parser;
use fleet_supervisor::Daemon;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "svscand", about = "Process supervisor daemon for the agent fleet runtime")]
struct Args {
    /// Path to the Unix socket to bind.
    #[arg(long)]
    socket: PathBuf,

    /// Path to write this process's pid to.
    #[arg(long = "pid-file")]
    pid_file: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let daemon = Arc::new(Daemon::new());

    if let Err(err) = daemon.run(&args.socket, &args.pid_file, shutdown_signal()).await {
        tracing::error!(%err, "svscand exiting");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install SIGTERM handler"),
        }
    };
    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
