//! The memory index: an append-only identifier log, the source of truth
//! walked by window assembly.

use crate::entry::{IndexEntry, QueryFilter, ScoredIdentifier};
use crate::substrate::{AppendOnlyIndex, Index};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::Identifier;
use fleet_error::FleetError;
use fleet_storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payload stored with each memory entry: the moment it was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendStamp {
    /// When the identifier was appended to the log.
    pub appended_at: DateTime<Utc>,
}

/// An append-only log of identifiers, scoped per-conversation by `name`,
/// carrying no payload beyond the append timestamp.
pub struct MemoryIndex {
    inner: AppendOnlyIndex<AppendStamp>,
}

impl MemoryIndex {
    /// Build an index backed by `<name>.jsonl` on `store`.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            inner: AppendOnlyIndex::new(store, name),
        }
    }

    /// Append `identifier` to the log, stamped now.
    pub async fn add(&self, identifier: Identifier) -> Result<(), FleetError> {
        let stamp = AppendStamp { appended_at: Utc::now() };
        self.inner.add(IndexEntry::new(identifier, stamp)).await
    }

    /// Every identifier in append order, the order window assembly walks.
    pub async fn list(&self) -> Vec<Identifier> {
        self.inner.snapshot().await.into_iter().map(|e| e.identifier).collect()
    }

    /// `list()` filtered through the shared prefix/limit/max_tokens filter.
    pub async fn query_items(&self, filter: &QueryFilter) -> Vec<ScoredIdentifier> {
        self.inner.query_with(filter, |_| Some(0.0)).await
    }
}

#[async_trait]
impl Index<AppendStamp> for MemoryIndex {
    async fn add(&self, entry: IndexEntry<AppendStamp>) -> Result<(), FleetError> {
        self.inner.add(entry).await
    }

    async fn has(&self, id: &str) -> Result<bool, FleetError> {
        self.inner.has(id).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<AppendStamp>>, FleetError> {
        self.inner.get(ids).await
    }

    async fn load_data(&self) -> Result<(), FleetError> {
        self.inner.load_data().await
    }

    async fn flush(&self) -> Result<(), FleetError> {
        self.inner.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_storage::NullStore;

    fn id(name: &str) -> Identifier {
        Identifier::new("common.Message", name)
    }

    #[tokio::test]
    async fn list_preserves_append_order() {
        let idx = MemoryIndex::new(Arc::new(NullStore::new()), "c0");
        idx.add(id("m1")).await.unwrap();
        idx.add(id("m2")).await.unwrap();
        idx.add(id("m3")).await.unwrap();
        let names: Vec<String> = idx.list().await.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn entries_survive_reload_with_their_stamp() {
        let store = Arc::new(NullStore::new());
        {
            let idx = MemoryIndex::new(store.clone(), "c0");
            idx.add(id("m1")).await.unwrap();
        }
        let idx2 = MemoryIndex::new(store, "c0");
        idx2.load_data().await.unwrap();
        let entries = idx2.get(&[id("m1").to_canonical()]).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].payload.appended_at <= Utc::now());
    }

    #[tokio::test]
    async fn query_items_respects_max_tokens_boundary() {
        let idx = MemoryIndex::new(Arc::new(NullStore::new()), "c0");
        idx.add(id("m1").with_tokens(10)).await.unwrap();
        idx.add(id("m2").with_tokens(10)).await.unwrap();
        idx.add(id("m3").with_tokens(5)).await.unwrap();
        let results = idx
            .query_items(&QueryFilter::unlimited().with_max_tokens(20))
            .await;
        assert_eq!(results.len(), 2);
    }
}
