//! Where finished spans go once a call completes.

use async_trait::async_trait;
use fleet_core::Span;

/// A trace collector client. Implementations ship finished spans somewhere
/// (a storage bucket, a remote collector); [`super::Tracer`] only knows
/// that a span is handed off exactly once, after it's been ended.
#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Record a finished span. Errors are logged by the caller, never
    /// propagated into the RPC path the span described.
    async fn record_span(&self, span: Span);
}

/// A sink that discards every span. Useful as a default when no collector
/// is configured, and in tests that only care about the span returned to
/// the caller.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl TraceSink for NullSink {
    async fn record_span(&self, _span: Span) {}
}
