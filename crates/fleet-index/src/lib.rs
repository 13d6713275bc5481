// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only index substrate for the agent fleet runtime, specialized
//! into resource, vector, graph, and memory indices.
//!
//! Every specialization shares one contract (add/has/get/load_data/flush,
//! see [`Index`]) and one post-match filter (prefix, limit, max_tokens, see
//! [`QueryFilter`]); what differs is the component-specific match that runs
//! before that shared filter.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffered;
mod entry;
mod indices;
mod substrate;

pub use buffered::{BufferedIndex, BufferedIndexConfig};
pub use entry::{IndexEntry, QueryFilter, ScoredIdentifier, apply_shared_filter};
pub use indices::graph_index::{GraphIndex, GraphQueryError, Quad, WILDCARD, parse_graph_query};
pub use indices::memory_index::{AppendStamp, MemoryIndex};
pub use indices::resource_index::{AllowAll, Policy, ResourceIndex};
pub use indices::vector_index::VectorIndex;
pub use substrate::{AppendOnlyIndex, Index};
