//! `fit-storage` — bucket lifecycle and data sync against the configured
//! object store (`STORAGE_TYPE` selects local, s3, or supabase; see
//! `fleet-storage::select`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_cli::EXIT_ERROR;
use fleet_storage::{ObjectStore, StorageSettings, StorageValue, select_store};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fit-storage", about = "Bucket lifecycle and data sync for the fleet's object store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Local filesystem root for the `local` backend. Overrides
    /// `STORAGE_ROOT` when set.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Bucket (storage prefix namespace) to operate on.
    #[arg(long)]
    bucket: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create the bucket if it does not already exist.
    CreateBucket,
    /// Block until the bucket exists and the store is healthy, or time out.
    Wait {
        /// Maximum time to wait, in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        timeout: u64,
    },
    /// Upload a local file to a key.
    Upload {
        /// Destination key.
        key: String,
        /// Local file to read.
        file: PathBuf,
    },
    /// Download a key to a local file.
    Download {
        /// Source key.
        key: String,
        /// Local file to write.
        file: PathBuf,
    },
    /// List keys in the bucket.
    List {
        /// Restrict to one or more prefixes. Repeatable. Defaults to the whole bucket.
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
        /// Collapse each prefix's matches to distinct next-segment prefixes.
        #[arg(long)]
        delimiter: Option<char>,
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
    let mut settings = StorageSettings::from_process_env();
    if let Some(root) = &cli.root {
        settings.root = root.display().to_string();
    }
    let store = select_store(&cli.bucket, &settings).context("select storage backend")?;

    match cli.command {
        Command::CreateBucket => {
            store.ensure_bucket().await.context("create bucket")?;
            println!("bucket ready: {}", store.path(""));
        }
        Command::Wait { timeout } => wait_for_bucket(store.as_ref(), Duration::from_millis(timeout)).await?,
        Command::Upload { key, file } => upload(store.as_ref(), &key, &file).await?,
        Command::Download { key, file } => download(store.as_ref(), &key, &file).await?,
        Command::List { prefixes, delimiter } => list(store.as_ref(), &prefixes, delimiter).await?,
    }
    Ok(())
}

async fn wait_for_bucket(store: &dyn ObjectStore, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if store.bucket_exists().await.context("check bucket")? && store.is_healthy().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("bucket {} did not become ready within {timeout:?}", store.path(""));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn upload(store: &dyn ObjectStore, key: &str, file: &std::path::Path) -> Result<()> {
    let bytes = tokio::fs::read(file).await.with_context(|| format!("read {}", file.display()))?;
    let value = StorageValue::decode(key, bytes)?;
    store.put(key, value).await.with_context(|| format!("upload {key}"))?;
    println!("uploaded {key}");
    Ok(())
}

async fn download(store: &dyn ObjectStore, key: &str, file: &std::path::Path) -> Result<()> {
    let value = store.get(key).await.with_context(|| format!("download {key}"))?;
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| format!("mkdir {}", parent.display()))?;
    }
    tokio::fs::write(file, value.to_bytes())
        .await
        .with_context(|| format!("write {}", file.display()))?;
    println!("downloaded {key} -> {}", file.display());
    Ok(())
}

async fn list(store: &dyn ObjectStore, prefixes: &[String], delimiter: Option<char>) -> Result<()> {
    let mut keys = if prefixes.is_empty() {
        store.list().await.context("list")?
    } else {
        let mut out = Vec::new();
        for prefix in prefixes {
            out.extend(store.find_by_prefix(prefix, delimiter).await.with_context(|| format!("list prefix {prefix}"))?);
        }
        out
    };
    keys.sort();
    keys.dedup();
    for key in keys {
        println!("{key}");
    }
    Ok(())
}
