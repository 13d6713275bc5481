//! Shared entry, filter, and scoring types for every index specialization.

use fleet_core::Identifier;
use serde::{Deserialize, Serialize};

/// One stored record in an index: a canonical id, the identifier it names,
/// and a component-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry<P> {
    /// Canonical string form of `identifier`.
    pub id: String,
    /// The identifier this entry names.
    pub identifier: Identifier,
    /// Component-specific payload (vector, quads, full resource, or unit).
    pub payload: P,
}

impl<P> IndexEntry<P> {
    /// Build an entry, deriving `id` from `identifier`.
    pub fn new(identifier: Identifier, payload: P) -> Self {
        Self {
            id: identifier.to_canonical(),
            identifier,
            payload,
        }
    }
}

/// Shared filter applied after the component-specific match in
/// `query_items`, per the substrate contract.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Keep only entries whose canonical id starts with this prefix.
    pub prefix: Option<String>,
    /// Maximum number of results. `0` or absent means unlimited.
    pub limit: usize,
    /// Accumulate candidates in score order and stop once the next would
    /// exceed this budget; an entry landing exactly on the limit is kept.
    pub max_tokens: Option<u32>,
}

impl QueryFilter {
    /// An unrestricted filter.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Builder-style prefix setter.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Builder-style limit setter.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Builder-style max_tokens setter.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// An identifier returned from a scored query (vector/graph/resource),
/// carrying the score that produced its rank.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredIdentifier {
    /// The matched identifier.
    pub identifier: Identifier,
    /// Match score; `0.0` for unscored (graph/resource/memory) queries.
    pub score: f64,
}

impl From<fleet_core::api::QueryFilter> for QueryFilter {
    /// Adopt a wire filter, dropping `threshold` (it gates the
    /// component-specific match, not the shared post-filter; vector
    /// queries read it from the request themselves).
    fn from(wire: fleet_core::api::QueryFilter) -> Self {
        Self {
            prefix: wire.prefix,
            limit: wire.limit as usize,
            max_tokens: wire.max_tokens,
        }
    }
}

impl From<ScoredIdentifier> for fleet_core::api::ScoredItem {
    fn from(scored: ScoredIdentifier) -> Self {
        Self {
            identifier: scored.identifier,
            score: scored.score,
        }
    }
}

/// Apply the shared `prefix`/`limit`/`max_tokens` filter to a list of
/// candidates already sorted in the caller's preferred order (score
/// descending for scored indexes, append order otherwise).
///
/// `max_tokens` admission is strict-next: an entry whose cumulative sum
/// exactly equals the budget is kept; the entry that would exceed it stops
/// the scan. If the very first candidate already exceeds the budget, the
/// result is empty. See the Open Questions note in DESIGN.md.
pub fn apply_shared_filter(
    candidates: Vec<(ScoredIdentifier, u32)>,
    filter: &QueryFilter,
) -> Vec<ScoredIdentifier> {
    let mut out = Vec::new();
    let mut cumulative: u32 = 0;
    for (scored, tokens) in candidates {
        if let Some(prefix) = &filter.prefix
            && !scored.identifier.canonical_starts_with(prefix)
        {
            continue;
        }
        if let Some(max_tokens) = filter.max_tokens {
            let next = cumulative + tokens;
            if next > max_tokens {
                break;
            }
            cumulative = next;
        }
        out.push(scored);
        if filter.limit != 0 && out.len() >= filter.limit {
            break;
        }
    }
    out
}
