//! The graph index: RDF-style quads grouped by subject identifier, queried
//! by a three-token subject/predicate/object pattern with `?` wildcards.

use crate::entry::{IndexEntry, QueryFilter, ScoredIdentifier};
use crate::substrate::{AppendOnlyIndex, Index};
use async_trait::async_trait;
use fleet_core::Identifier;
use fleet_error::FleetError;
use fleet_storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// One subject/predicate/object statement about a subject identifier,
/// optionally scoped to a named graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    /// Canonical id of the statement's subject.
    pub subject: String,
    /// Relation name, e.g. `"cites"` or `"derivedFrom"`.
    pub predicate: String,
    /// Object value: another canonical id, or an opaque literal.
    pub object: String,
    /// Named graph this statement belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
}

/// Wildcard token matching any value in a query pattern.
pub const WILDCARD: &str = "?";

/// An append-only index over quads, one stored entry per subject
/// identifier holding every quad asserted about it.
pub struct GraphIndex {
    inner: AppendOnlyIndex<Vec<Quad>>,
}

impl GraphIndex {
    /// Build an index backed by `<name>.jsonl` on `store`.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            inner: AppendOnlyIndex::new(store, name),
        }
    }

    /// Assert `quads` about `subject`, merging with any quads already
    /// recorded for it.
    pub async fn add(&self, subject: Identifier, quads: Vec<Quad>) -> Result<(), FleetError> {
        let existing = self.inner.get(&[subject.to_canonical()]).await?;
        let mut merged = existing.into_iter().next().map(|e| e.payload).unwrap_or_default();
        for quad in quads {
            if !merged.contains(&quad) {
                merged.push(quad);
            }
        }
        self.inner.add(IndexEntry::new(subject, merged)).await
    }

    /// Identifiers of subjects with at least one quad matching `pattern`
    /// (subject, predicate, object — each literal or [`WILDCARD`]), in
    /// append order, then through the shared prefix/limit/max_tokens filter.
    pub async fn query_items(
        &self,
        pattern: (&str, &str, &str),
        filter: &QueryFilter,
    ) -> Vec<ScoredIdentifier> {
        let (subject_pat, predicate_pat, object_pat) = pattern;
        self.inner
            .query_with(filter, |entry| {
                let subject_ok = subject_pat == WILDCARD || subject_pat == entry.id;
                if !subject_ok {
                    return None;
                }
                let any_quad_matches = entry.payload.iter().any(|quad| {
                    (predicate_pat == WILDCARD || predicate_pat == quad.predicate)
                        && (object_pat == WILDCARD || object_pat == quad.object)
                });
                any_quad_matches.then_some(0.0)
            })
            .await
    }
}

#[async_trait]
impl Index<Vec<Quad>> for GraphIndex {
    async fn add(&self, entry: IndexEntry<Vec<Quad>>) -> Result<(), FleetError> {
        self.inner.add(entry).await
    }

    async fn has(&self, id: &str) -> Result<bool, FleetError> {
        self.inner.has(id).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry<Vec<Quad>>>, FleetError> {
        self.inner.get(ids).await
    }

    async fn load_data(&self) -> Result<(), FleetError> {
        self.inner.load_data().await
    }

    async fn flush(&self) -> Result<(), FleetError> {
        self.inner.flush().await
    }
}

/// A malformed graph query line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphQueryError {
    /// Fewer than three tokens were present.
    #[error("graph query {0:?} needs 3 tokens (subject predicate object), found {1}")]
    TooFewTokens(String, usize),
    /// More than three tokens were present.
    #[error("graph query {0:?} has trailing content after the object")]
    TrailingContent(String),
    /// A quoted object literal was never closed.
    #[error("graph query {0:?} has an unterminated quoted object")]
    UnterminatedQuote(String),
}

/// Parse a query line of the form `subject predicate object`, where
/// `object` may be a bare token or a `"quoted literal with spaces"`.
/// Any token may be [`WILDCARD`]. Exactly three tokens are required.
pub fn parse_graph_query(line: &str) -> Result<(String, String, String), GraphQueryError> {
    let trimmed = line.trim();
    let mut rest = trimmed;

    let (subject, r) = take_token(rest).ok_or_else(|| GraphQueryError::TooFewTokens(line.to_string(), 0))?;
    rest = r;
    let (predicate, r) = take_token(rest).ok_or_else(|| GraphQueryError::TooFewTokens(line.to_string(), 1))?;
    rest = r;

    let object_part = rest.trim();
    if object_part.is_empty() {
        return Err(GraphQueryError::TooFewTokens(line.to_string(), 2));
    }
    let object = if let Some(quoted) = object_part.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or_else(|| GraphQueryError::UnterminatedQuote(line.to_string()))?;
        if !quoted[end + 1..].trim().is_empty() {
            return Err(GraphQueryError::TrailingContent(line.to_string()));
        }
        quoted[..end].to_string()
    } else {
        let mut parts = object_part.split_whitespace();
        let object = parts.next().unwrap_or_default().to_string();
        if parts.next().is_some() {
            return Err(GraphQueryError::TrailingContent(line.to_string()));
        }
        object
    };

    Ok((subject.to_string(), predicate.to_string(), object))
}

fn take_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(idx) => Some((&s[..idx], &s[idx..])),
        None => Some((s, "")),
    }
}
