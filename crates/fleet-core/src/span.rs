//! Span: one node in a distributed trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The role a span plays in an RPC exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Incoming RPC handler.
    Server,
    /// Outgoing RPC call.
    Client,
    /// Non-RPC internal work.
    Internal,
}

/// Final outcome of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Completed without error.
    Ok,
    /// Completed with an error.
    Error,
}

/// A span's terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStatus {
    /// Ok or Error.
    pub code: StatusCode,
    /// Present when `code == Error`.
    pub message: Option<String>,
}

impl SpanStatus {
    /// An `Ok` status with no message.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    /// An `Error` status carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: Some(message.into()),
        }
    }
}

/// A point-in-time annotation on a span (e.g. `request_received`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    /// When the event occurred.
    pub time: DateTime<Utc>,
    /// Event name.
    pub name: String,
    /// Arbitrary key-value attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl SpanEvent {
    /// Construct an event with no attributes, stamped `now`.
    pub fn new(now: DateTime<Utc>, name: impl Into<String>) -> Self {
        Self {
            time: now,
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.attributes.insert(key.into(), v);
        }
        self
    }
}

/// One node in a distributed trace.
///
/// A span is created on call entry and finalized exactly once on exit
/// (success, error, or stream end); see [`Span::end`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Shared by every span in one logical operation.
    pub trace_id: String,
    /// Unique to this span.
    pub span_id: String,
    /// The span that caused this one, if any.
    pub parent_span_id: Option<String>,
    /// `"<Service>.<Method>"` or a descriptive internal name.
    pub name: String,
    /// Server, Client, or Internal.
    pub kind: SpanKind,
    /// Name of the service that owns this span.
    pub service_name: String,
    /// When the span started.
    pub start_time: DateTime<Utc>,
    /// When the span ended; `None` until [`Span::end`] is called.
    pub end_time: Option<DateTime<Utc>>,
    /// Arbitrary key-value attributes (e.g. `rpc_service`, `rpc_method`).
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Ordered list of point-in-time annotations.
    pub events: Vec<SpanEvent>,
    /// Terminal status; `None` until [`Span::end`] is called.
    pub status: Option<SpanStatus>,
    /// Resource this span's operation concerns, if any.
    pub resource_id: Option<String>,
}

impl Span {
    /// Start a new, unfinished span.
    pub fn start(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        parent_span_id: Option<String>,
        name: impl Into<String>,
        kind: SpanKind,
        service_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id,
            name: name.into(),
            kind,
            service_name: service_name.into(),
            start_time: now,
            end_time: None,
            attributes: BTreeMap::new(),
            events: Vec::new(),
            status: None,
            resource_id: None,
        }
    }

    /// Attach a key-value attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.attributes.insert(key.into(), v);
        }
    }

    /// Append a point-in-time event.
    pub fn add_event(&mut self, event: SpanEvent) {
        self.events.push(event);
    }

    /// Whether [`Span::end`] has already been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Finalize the span with the given status at time `now`.
    ///
    /// A second call is a no-op, matching the source contract that a span
    /// must be finalized exactly once.
    pub fn end(&mut self, status: SpanStatus, now: DateTime<Utc>) {
        if self.is_finished() {
            return;
        }
        self.end_time = Some(now);
        self.status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_end_call_is_a_no_op() {
        let t0 = Utc::now();
        let mut span = Span::start("tr", "sp", None, "Agent.ProcessUnary", SpanKind::Server, "agent", t0);
        span.end(SpanStatus::ok(), t0 + chrono::Duration::milliseconds(5));
        let first_end = span.end_time;
        span.end(SpanStatus::error("too late"), t0 + chrono::Duration::milliseconds(50));
        assert_eq!(span.end_time, first_end);
        assert_eq!(span.status, Some(SpanStatus::ok()));
    }
}
