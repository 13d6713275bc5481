//! Wire shapes for the fleet's service surfaces.
//!
//! Every service speaks JSON bodies shaped by these types; they live here
//! so a service and its callers cannot drift apart. The agent
//! orchestration surface carries service-specific payloads and is not
//! defined here.

use crate::identifier::Identifier;
use crate::resource::{MessageResource, ToolFunctionResource};
use crate::span::Span;
use serde::{Deserialize, Serialize};

/// The shared query filter carried by vector and graph queries.
///
/// `threshold` only applies to scored (vector) queries; the other fields
/// follow the index substrate's shared-filter semantics: `prefix`
/// restricts by canonical-id prefix, `limit = 0` means unlimited, and
/// `max_tokens` cuts the result in score order at the token budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Keep only identifiers whose canonical form starts with this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Maximum number of results; `0` means unlimited.
    #[serde(default)]
    pub limit: u32,
    /// Token budget over the result set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Minimum similarity score; vector queries only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// An identifier returned from a scored query, carrying the score that
/// produced its rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    /// The matched identifier.
    pub identifier: Identifier,
    /// Match score; `0.0` for unscored queries.
    pub score: f64,
}

/// Narrow a span query to one trace, one resource, or both. An empty
/// filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanFilter {
    /// Keep only spans belonging to this trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Keep only spans concerning this resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl SpanFilter {
    /// Whether `span` satisfies every set field.
    #[must_use]
    pub fn matches(&self, span: &Span) -> bool {
        if let Some(trace_id) = &self.trace_id
            && span.trace_id != *trace_id
        {
            return false;
        }
        if let Some(resource_id) = &self.resource_id
            && span.resource_id.as_deref() != Some(resource_id.as_str())
        {
            return false;
        }
        true
    }

    /// Apply this filter to a recorded span list, preserving record order.
    #[must_use]
    pub fn apply(&self, spans: &[Span]) -> Vec<Span> {
        spans.iter().filter(|s| self.matches(s)).cloned().collect()
    }
}

/// A bounded prompt window: ordered messages plus deduplicated tools.
/// Returned by `Memory.GetWindow` and consumed by `Llm.CreateCompletions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptWindow {
    /// Ordered messages; element 0 is the agent's message.
    pub messages: Vec<MessageResource>,
    /// Deduplicated tool definitions.
    pub tools: Vec<ToolFunctionResource>,
    /// The budget the window was assembled against.
    pub max_tokens: u32,
}

/// `Memory.AppendMemory`: append identifiers to a conversation's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendMemoryRequest {
    /// Canonical id of the conversation whose log grows.
    pub resource_id: String,
    /// Identifiers to append, in order.
    pub identifiers: Vec<Identifier>,
}

/// `Memory.GetWindow`: assemble a window for a conversation and model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetWindowRequest {
    /// Canonical id of the conversation.
    pub resource_id: String,
    /// Model name; selects the token budget.
    pub model: String,
}

/// `Trace.QuerySpans`: fetch recorded spans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpansRequest {
    /// Free-text query; reserved, currently unused by the collector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Structural filter.
    #[serde(default)]
    pub filter: SpanFilter,
}

/// Reply to [`QuerySpansRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpansResponse {
    /// Matching spans, in record order.
    pub spans: Vec<Span>,
}

/// `Vector.QueryItems`: similarity search over one or more query vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryItemsRequest {
    /// Query vectors; an entry's score is its best match across these.
    pub vectors: Vec<Vec<f32>>,
    /// Shared filter, including the score threshold.
    #[serde(default)]
    pub filter: QueryFilter,
}

/// Reply to [`QueryItemsRequest`] and [`QueryByPatternRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryItemsResponse {
    /// Matches in descending score order (append order for graphs).
    pub identifiers: Vec<ScoredItem>,
}

/// A graph pattern; each field is a concrete value or the `"?"` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPattern {
    /// Subject canonical id or `"?"`.
    pub subject: String,
    /// Predicate or `"?"`.
    pub predicate: String,
    /// Object value or `"?"`.
    pub object: String,
}

/// `Graph.QueryByPattern`: subjects with at least one matching quad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryByPatternRequest {
    /// The pattern to resolve.
    pub pattern: GraphPattern,
    /// Shared filter.
    #[serde(default)]
    pub filter: QueryFilter,
}

/// `Llm.CreateEmbeddings`: embed a batch of texts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEmbeddingsRequest {
    /// Texts to embed, in order.
    pub texts: Vec<String>,
}

/// Reply to [`CreateEmbeddingsRequest`]; one vector per input text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEmbeddingsResponse {
    /// Embedding vectors, parallel to the request's texts.
    pub vectors: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_filter_defaults_serialize_sparsely() {
        let json = serde_json::to_value(QueryFilter::default()).unwrap();
        assert_eq!(json, serde_json::json!({"limit": 0}));
    }

    #[test]
    fn append_memory_wire_shape() {
        let request = AppendMemoryRequest {
            resource_id: "common.Conversation.c0".into(),
            identifiers: vec![Identifier::new("common.Message", "m1").with_tokens(10)],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["resource_id"], "common.Conversation.c0");
        assert_eq!(json["identifiers"][0]["tokens"], 10);
        let back: AppendMemoryRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn query_requests_accept_omitted_filters() {
        let request: QueryItemsRequest = serde_json::from_value(serde_json::json!({
            "vectors": [[1.0, 0.0]],
        }))
        .unwrap();
        assert_eq!(request.filter, QueryFilter::default());

        let request: QuerySpansRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(request.filter, SpanFilter::default());
    }

    #[test]
    fn span_filter_narrows_by_trace_and_resource() {
        use crate::span::SpanKind;
        let mut span = Span::start("t1", "s1", None, "Svc.M", SpanKind::Internal, "svc", chrono::Utc::now());
        span.resource_id = Some("r1".into());

        assert!(SpanFilter::default().matches(&span));
        let filter = SpanFilter {
            trace_id: Some("t1".into()),
            resource_id: Some("r1".into()),
        };
        assert!(filter.matches(&span));
        let wrong = SpanFilter {
            trace_id: Some("t2".into()),
            resource_id: None,
        };
        assert!(!wrong.matches(&span));
    }
}
