//! The append-only index substrate shared by every specialization.

use crate::entry::{IndexEntry, QueryFilter};
use async_trait::async_trait;
use fleet_error::FleetError;
use fleet_storage::{ObjectStore, StorageValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The core substrate contract every index specialization builds on:
/// record presence, point lookup, component-specific querying, and
/// durability.
#[async_trait]
pub trait Index<P>: Send + Sync
where
    P: Clone + Send + Sync,
{
    /// Append or overwrite `entry`.
    async fn add(&self, entry: IndexEntry<P>) -> Result<(), FleetError>;

    /// Whether an entry with canonical id `id` exists.
    async fn has(&self, id: &str) -> Result<bool, FleetError>;

    /// Fetch entries for `ids`, silently omitting any that are missing.
    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<P>>, FleetError>;

    /// (Re)populate the in-memory view from the backing store. Specializations
    /// call this once at startup; it is not required before `add`.
    async fn load_data(&self) -> Result<(), FleetError>;

    /// Force any buffered writes to reach the backing store.
    async fn flush(&self) -> Result<(), FleetError>;
}

/// A generic append-only index, backed by a single `<name>.jsonl` object,
/// holding entries in append order with overwrite-in-place on re-add.
///
/// This is the engine that [`crate::VectorIndex`], [`crate::GraphIndex`],
/// and [`crate::MemoryIndex`] specialize with their own payload type and
/// query predicate. [`crate::ResourceIndex`] does not use it directly since
/// it persists one object per resource rather than a shared log.
pub struct AppendOnlyIndex<P> {
    store: Arc<dyn ObjectStore>,
    key: String,
    entries: RwLock<Vec<IndexEntry<P>>>,
}

impl<P> AppendOnlyIndex<P>
where
    P: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    /// Build an index backed by `<name>.jsonl` on `store`.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            key: format!("{}.jsonl", name.into()),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of all entries in append order.
    pub async fn snapshot(&self) -> Vec<IndexEntry<P>> {
        self.entries.read().await.clone()
    }

    /// Insert or overwrite `entry` in the in-memory view only, without
    /// touching the backing store. Used by [`crate::BufferedIndex`] to make
    /// writes visible to readers ahead of the deferred durable append.
    pub(crate) async fn insert_in_memory(&self, entry: IndexEntry<P>) {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    /// Append `entry`'s encoded form to the backing store only, without
    /// touching the in-memory view (already updated via `insert_in_memory`).
    pub(crate) async fn persist_entry(&self, entry: &IndexEntry<P>) -> Result<(), FleetError> {
        let value = Self::encode_entry(entry)?;
        self.store.append(&self.key, value).await
    }

    /// Append a batch of already-encoded records in one storage operation.
    /// Used by [`crate::BufferedIndex`]'s drain.
    pub(crate) async fn persist_batch(&self, values: Vec<serde_json::Value>) -> Result<(), FleetError> {
        self.store.append_many(&self.key, values).await
    }

    pub(crate) fn encode_entry(entry: &IndexEntry<P>) -> Result<serde_json::Value, FleetError> {
        serde_json::to_value(entry)
            .map_err(|e| FleetError::internal(format!("failed to encode index entry: {e}")))
    }

    /// Run `matcher` over the current snapshot, keeping only `Some(score)`
    /// results, sorting candidates as `matcher` orders them (callers sort the
    /// returned pairs themselves before calling `apply_shared_filter`), then
    /// applying the shared prefix/limit/max_tokens filter.
    pub async fn query_with<F>(
        &self,
        filter: &QueryFilter,
        mut matcher: F,
    ) -> Vec<crate::entry::ScoredIdentifier>
    where
        F: FnMut(&IndexEntry<P>) -> Option<f64>,
    {
        let entries = self.entries.read().await;
        let mut candidates: Vec<(crate::entry::ScoredIdentifier, u32)> = entries
            .iter()
            .filter_map(|entry| {
                matcher(entry).map(|score| {
                    (
                        crate::entry::ScoredIdentifier {
                            identifier: entry.identifier.clone(),
                            score,
                        },
                        entry.identifier.tokens,
                    )
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.0.score.partial_cmp(&a.0.score).unwrap_or(std::cmp::Ordering::Equal));
        crate::entry::apply_shared_filter(candidates, filter)
    }
}

#[async_trait]
impl<P> Index<P> for AppendOnlyIndex<P>
where
    P: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    async fn add(&self, entry: IndexEntry<P>) -> Result<(), FleetError> {
        self.insert_in_memory(entry.clone()).await;
        self.persist_entry(&entry).await
    }

    async fn has(&self, id: &str) -> Result<bool, FleetError> {
        Ok(self.entries.read().await.iter().any(|e| e.id == id))
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<P>>, FleetError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| ids.contains(&e.id)).cloned().collect())
    }

    async fn load_data(&self) -> Result<(), FleetError> {
        if !self.store.exists(&self.key).await? {
            return Ok(());
        }
        let value = self.store.get(&self.key).await?;
        let StorageValue::JsonLines(items) = value else {
            return Err(FleetError::internal(format!("{} is not JSON lines", self.key)));
        };
        let mut loaded = Vec::with_capacity(items.len());
        for item in items {
            let entry: IndexEntry<P> = serde_json::from_value(item)
                .map_err(|e| FleetError::internal(format!("corrupt index entry in {}: {e}", self.key)))?;
            loaded.push(entry);
        }
        let mut entries = self.entries.write().await;
        let mut merged: Vec<IndexEntry<P>> = Vec::new();
        for entry in loaded {
            if let Some(existing) = merged.iter_mut().find(|e: &&mut IndexEntry<P>| e.id == entry.id) {
                *existing = entry;
            } else {
                merged.push(entry);
            }
        }
        *entries = merged;
        Ok(())
    }

    async fn flush(&self) -> Result<(), FleetError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Identifier;
    use fleet_storage::NullStore;

    fn id(name: &str) -> Identifier {
        Identifier::new("t.Thing", name)
    }

    #[tokio::test]
    async fn add_then_has_and_get() {
        let idx: AppendOnlyIndex<String> = AppendOnlyIndex::new(Arc::new(NullStore::new()), "things");
        idx.add(IndexEntry::new(id("a"), "payload-a".to_string())).await.unwrap();
        assert!(idx.has(&id("a").to_canonical()).await.unwrap());
        assert!(!idx.has(&id("b").to_canonical()).await.unwrap());
        let got = idx.get(&[id("a").to_canonical()]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload, "payload-a");
    }

    #[tokio::test]
    async fn re_add_overwrites_in_place() {
        let idx: AppendOnlyIndex<String> = AppendOnlyIndex::new(Arc::new(NullStore::new()), "things");
        idx.add(IndexEntry::new(id("a"), "v1".to_string())).await.unwrap();
        idx.add(IndexEntry::new(id("b"), "v-b".to_string())).await.unwrap();
        idx.add(IndexEntry::new(id("a"), "v2".to_string())).await.unwrap();
        let snapshot = idx.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].payload, "v2");
    }

    #[tokio::test]
    async fn load_data_restores_from_store() {
        let store = Arc::new(NullStore::new());
        {
            let idx: AppendOnlyIndex<String> = AppendOnlyIndex::new(store.clone(), "things");
            idx.add(IndexEntry::new(id("a"), "v1".to_string())).await.unwrap();
        }
        let idx2: AppendOnlyIndex<String> = AppendOnlyIndex::new(store, "things");
        idx2.load_data().await.unwrap();
        assert!(idx2.has(&id("a").to_canonical()).await.unwrap());
    }
}
