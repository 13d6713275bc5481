//! `fit-rc` — starts, stops, and reports on the declared service list via
//! the supervisor daemon (see `fleet-supervisor`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_cli::EXIT_ERROR;
use fleet_supervisor::{Manager, ServiceSpec};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fit-rc", about = "Start, stop, and inspect the fleet's supervised services")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the supervisor's socket/PID/log files and, by
    /// default, its service list.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to the declared service list JSON. Defaults to `<root>/services.json`.
    #[arg(long)]
    services: Option<PathBuf>,

    /// Short output: one `name state` line per service, no header.
    #[arg(short = 's', long = "short")]
    short: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start all services, or every service up to and including `service`.
    Start {
        /// Service name. Omit to start everything in declared order.
        service: Option<String>,
    },
    /// Stop all services, or every service from the end back to `service`.
    Stop {
        /// Service name. Omit to stop everything in reverse declared order.
        service: Option<String>,
    },
    /// Report state for all services, or just `service`.
    Status {
        /// Service name. Omit to report on everything.
        service: Option<String>,
    },
    /// Stop then start.
    Restart {
        /// Service name. Omit to restart everything.
        service: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    fleet_cli::init_logging();
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(EXIT_ERROR);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let services = load_services(&cli.root, cli.services.as_deref())?;
    let manager = Manager::new(services, cli.root);

    match cli.command {
        Command::Start { service } => manager.start(service.as_deref()).await.context("start")?,
        Command::Stop { service } => manager.stop(service.as_deref()).await.context("stop")?,
        Command::Restart { service } => manager.restart(service.as_deref()).await.context("restart")?,
        Command::Status { service } => {
            match manager.status(service.as_deref()).await.context("status")? {
                None => println!("not running"),
                Some(statuses) => print_status(&statuses, cli.short),
            }
        }
    }
    Ok(())
}

fn load_services(root: &std::path::Path, explicit: Option<&std::path::Path>) -> Result<Vec<ServiceSpec>> {
    let path = explicit.map(PathBuf::from).unwrap_or_else(|| root.join("services.json"));
    let content = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

fn print_status(statuses: &std::collections::BTreeMap<String, fleet_supervisor::ServiceStatus>, short: bool) {
    for (name, status) in statuses {
        let state = format!("{:?}", status.state).to_lowercase();
        if short {
            println!("{name} {state}");
        } else {
            match status.pid {
                Some(pid) => println!("{name}: {state} (pid {pid})"),
                None => println!("{name}: {state}"),
            }
        }
    }
}
