//! The trace-collector sink: finished spans go out over RPC to the Trace
//! service's `RecordSpan` method.

use crate::auth::AuthConfig;
use crate::client::Client;
use async_trait::async_trait;
use fleet_core::Span;
use fleet_error::FleetError;
use fleet_tracer::{NullSink, TraceSink, Tracer};
use std::sync::Arc;

/// Ships spans to the trace collector via `Trace.RecordSpan`.
///
/// The inner client is deliberately built with a [`NullSink`] tracer: a
/// traced trace-collector client would record a span for every span it
/// records. Failures are logged and swallowed — trace delivery must never
/// fail the call a span describes.
pub struct CollectorSink {
    client: Client,
}

impl CollectorSink {
    /// Build a sink for `calling_service_id` dialing the collector at
    /// `base_url`.
    pub fn new(
        calling_service_id: impl Into<String>,
        base_url: impl Into<String>,
        auth: AuthConfig,
    ) -> Result<Self, FleetError> {
        let calling_service_id = calling_service_id.into();
        let tracer = Tracer::new(calling_service_id.clone(), Arc::new(NullSink));
        let client = Client::new(calling_service_id, base_url, auth, tracer)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TraceSink for CollectorSink {
    async fn record_span(&self, span: Span) {
        let resource_id = span.resource_id.clone();
        if let Err(err) = self
            .client
            .call_unary::<Span, serde_json::Value>("Trace.RecordSpan", &span, resource_id.as_deref(), None)
            .await
        {
            tracing::warn!(trace_id = %span.trace_id, span_id = %span.span_id, %err, "span delivery failed");
        }
    }
}
