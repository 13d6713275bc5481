//! Buffered wrapper: batches writes and flushes on a size or time trigger.

use crate::entry::{IndexEntry, QueryFilter, ScoredIdentifier};
use crate::substrate::{AppendOnlyIndex, Index};
use async_trait::async_trait;
use fleet_error::FleetError;
use fleet_storage::ObjectStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::interval;

/// Tuning knobs for [`BufferedIndex`]'s flush behavior.
#[derive(Debug, Clone, Copy)]
pub struct BufferedIndexConfig {
    /// Drain the buffer once this many records have accumulated.
    pub max_buffer_size: usize,
    /// Drain the buffer at least this often even when it stays small.
    pub flush_interval: Duration,
}

impl Default for BufferedIndexConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 32,
            flush_interval: Duration::from_secs(2),
        }
    }
}

/// Wraps an [`AppendOnlyIndex`], making every write visible to readers
/// immediately while deferring the durable append into an in-process buffer
/// drained by size trigger, interval timer, explicit [`Index::flush`], or
/// [`BufferedIndex::shutdown`].
///
/// The buffer and its drain share one lock, so concurrent drains cannot
/// interleave batches out of write order.
pub struct BufferedIndex<P>
where
    P: Clone + Send + Sync + 'static,
{
    inner: Arc<AppendOnlyIndex<P>>,
    buffer: Arc<Mutex<Vec<serde_json::Value>>>,
    config: BufferedIndexConfig,
    shutdown_notify: Arc<Notify>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<P> BufferedIndex<P>
where
    P: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Wrap `store` as `<name>.jsonl` with the given flush configuration.
    /// Spawns the interval-flush worker immediately.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>, config: BufferedIndexConfig) -> Self {
        let inner = Arc::new(AppendOnlyIndex::new(store, name));
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let shutdown_notify = Arc::new(Notify::new());

        let worker_inner = inner.clone();
        let worker_buffer = buffer.clone();
        let worker_shutdown = shutdown_notify.clone();
        let worker = tokio::spawn(async move {
            let mut ticker = interval(config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of `interval` completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = Self::drain(&worker_inner, &worker_buffer).await {
                            tracing::error!(error = %e, "interval flush failed");
                        }
                    }
                    () = worker_shutdown.notified() => {
                        if let Err(e) = Self::drain(&worker_inner, &worker_buffer).await {
                            tracing::error!(error = %e, "shutdown flush failed");
                        }
                        break;
                    }
                }
            }
        });

        Self {
            inner,
            buffer,
            config,
            shutdown_notify,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Run `matcher` against the current in-memory view and apply the shared
    /// filter. Reads always see writes that have reached `add`, even while
    /// their durable append is still buffered.
    pub async fn query_with<F>(&self, filter: &QueryFilter, matcher: F) -> Vec<ScoredIdentifier>
    where
        F: FnMut(&IndexEntry<P>) -> Option<f64>,
    {
        self.inner.query_with(filter, matcher).await
    }

    async fn drain(
        inner: &AppendOnlyIndex<P>,
        buffer: &Mutex<Vec<serde_json::Value>>,
    ) -> Result<(), FleetError> {
        // Hold the buffer lock across the append so a concurrent drain
        // cannot reorder batches.
        let mut buf = buffer.lock().await;
        if buf.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut *buf);
        inner.persist_batch(batch).await
    }

    /// Flush pending writes and stop the background worker. Safe to call
    /// more than once; subsequent calls are no-ops.
    pub async fn shutdown(&self) {
        self.shutdown_notify.notify_one();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
        // The worker flushes before exiting, but anything enqueued between
        // its final drain and the join lands here.
        if let Err(e) = Self::drain(&self.inner, &self.buffer).await {
            tracing::error!(error = %e, "final shutdown flush failed");
        }
    }
}

#[async_trait]
impl<P> Index<P> for BufferedIndex<P>
where
    P: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn add(&self, entry: IndexEntry<P>) -> Result<(), FleetError> {
        let encoded = AppendOnlyIndex::encode_entry(&entry)?;
        self.inner.insert_in_memory(entry).await;
        let should_flush = {
            let mut buf = self.buffer.lock().await;
            buf.push(encoded);
            buf.len() >= self.config.max_buffer_size
        };
        if should_flush {
            Self::drain(&self.inner, &self.buffer).await?;
        }
        Ok(())
    }

    async fn has(&self, id: &str) -> Result<bool, FleetError> {
        self.inner.has(id).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<P>>, FleetError> {
        self.inner.get(ids).await
    }

    async fn load_data(&self) -> Result<(), FleetError> {
        // Reloading replaces the in-memory view with the store's contents,
        // so anything still buffered must reach the store first.
        Self::drain(&self.inner, &self.buffer).await?;
        self.inner.load_data().await
    }

    async fn flush(&self) -> Result<(), FleetError> {
        Self::drain(&self.inner, &self.buffer).await
    }
}
