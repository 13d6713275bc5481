//! The vector index: dot-product similarity search over normalized
//! embeddings.

use crate::entry::{IndexEntry, QueryFilter, ScoredIdentifier};
use crate::substrate::{AppendOnlyIndex, Index};
use async_trait::async_trait;
use fleet_core::Identifier;
use fleet_error::FleetError;
use fleet_storage::ObjectStore;
use std::sync::Arc;

/// An append-only index over L2-normalized embedding vectors, queried by
/// dot-product similarity against one or more query vectors.
pub struct VectorIndex {
    inner: AppendOnlyIndex<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index backed by `<name>.jsonl` on `store`.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            inner: AppendOnlyIndex::new(store, name),
        }
    }

    /// Add `vector` for `identifier`, normalizing it to unit length first.
    /// A zero vector is stored as-is (its dot product with anything is 0).
    pub async fn add(&self, identifier: Identifier, vector: Vec<f32>) -> Result<(), FleetError> {
        let normalized = normalize(vector);
        self.inner.add(IndexEntry::new(identifier, normalized)).await
    }

    /// Score every stored entry against each of `queries` (each normalized
    /// the same way), keeping the maximum score across queries per entry,
    /// discarding anything below `threshold`, then applying the shared
    /// prefix/limit/max_tokens filter in descending-score order.
    pub async fn query_items(
        &self,
        queries: &[Vec<f32>],
        threshold: f64,
        filter: &QueryFilter,
    ) -> Vec<ScoredIdentifier> {
        let normalized_queries: Vec<Vec<f32>> = queries.iter().cloned().map(normalize).collect();
        self.inner
            .query_with(filter, |entry| {
                let best = normalized_queries
                    .iter()
                    .map(|q| dot(q, &entry.payload))
                    .fold(f64::NEG_INFINITY, f64::max);
                if normalized_queries.is_empty() || best < threshold {
                    None
                } else {
                    Some(best)
                }
            })
            .await
    }
}

#[async_trait]
impl Index<Vec<f32>> for VectorIndex {
    async fn add(&self, entry: IndexEntry<Vec<f32>>) -> Result<(), FleetError> {
        self.inner.add(entry).await
    }

    async fn has(&self, id: &str) -> Result<bool, FleetError> {
        self.inner.has(id).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<Vec<f32>>>, FleetError> {
        self.inner.get(ids).await
    }

    async fn load_data(&self) -> Result<(), FleetError> {
        self.inner.load_data().await
    }

    async fn flush(&self) -> Result<(), FleetError> {
        self.inner.flush().await
    }
}

fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vector;
    }
    vector.into_iter().map(|x| (f64::from(x) / norm) as f32).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_storage::NullStore;

    fn id(name: &str) -> Identifier {
        Identifier::new("t.Doc", name)
    }

    #[tokio::test]
    async fn query_ranks_by_similarity_descending() {
        let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
        idx.add(id("close"), vec![1.0, 0.0]).await.unwrap();
        idx.add(id("far"), vec![0.0, 1.0]).await.unwrap();
        let results = idx
            .query_items(&[vec![1.0, 0.0]], 0.0, &QueryFilter::unlimited())
            .await;
        assert_eq!(results[0].identifier.name, "close");
    }

    #[tokio::test]
    async fn threshold_excludes_low_similarity() {
        let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
        idx.add(id("orthogonal"), vec![0.0, 1.0]).await.unwrap();
        let results = idx
            .query_items(&[vec![1.0, 0.0]], 0.5, &QueryFilter::unlimited())
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn multiple_queries_take_the_max_score_per_entry() {
        let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
        idx.add(id("a"), vec![1.0, 0.0]).await.unwrap();
        let results = idx
            .query_items(&[vec![0.0, 1.0], vec![1.0, 0.0]], 0.9, &QueryFilter::unlimited())
            .await;
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }
}
