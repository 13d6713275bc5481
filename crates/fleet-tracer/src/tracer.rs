//! Span creation and the four `observe_*` call wrappers RPC handlers and
//! clients are built on top of.

use crate::context::{Metadata, RESOURCE_ID_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER, current_span, with_span};
use crate::sink::TraceSink;
use chrono::Utc;
use fleet_core::{Span, SpanEvent, SpanKind, SpanStatus};
use fleet_error::FleetError;
use std::future::Future;
use std::sync::Arc;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Starts spans for one named service and hands finished ones to a
/// [`TraceSink`].
#[derive(Clone)]
pub struct Tracer {
    service_name: String,
    sink: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Build a tracer for `service_name`, shipping finished spans to `sink`.
    #[must_use]
    pub fn new(service_name: impl Into<String>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            service_name: service_name.into(),
            sink,
        }
    }

    /// Starts a SERVER span for an inbound call.
    ///
    /// `trace_id`/`parent_span_id` are adopted from `x-trace-id`/`x-span-id`
    /// in `incoming_metadata` when present, otherwise a fresh trace begins
    /// here. `resource_id` is taken from the request when given, falling
    /// back to the `x-resource-id` header; the request always wins on
    /// conflict.
    #[must_use]
    pub fn start_server_span(
        &self,
        method: &str,
        request_resource_id: Option<&str>,
        incoming_metadata: &Metadata,
    ) -> Span {
        let trace_id = incoming_metadata.get(TRACE_ID_HEADER).cloned().unwrap_or_else(new_id);
        let parent_span_id = incoming_metadata.get(SPAN_ID_HEADER).cloned();
        let resource_id = request_resource_id
            .map(str::to_string)
            .or_else(|| incoming_metadata.get(RESOURCE_ID_HEADER).cloned());

        let mut span = Span::start(
            trace_id,
            new_id(),
            parent_span_id,
            format!("{}.{method}", self.service_name),
            SpanKind::Server,
            self.service_name.clone(),
            Utc::now(),
        );
        span.resource_id = resource_id;
        span.set_attribute("rpc_service", &self.service_name);
        span.set_attribute("rpc_method", method);
        span
    }

    /// Starts a CLIENT span for an outbound call, inheriting `trace_id` and
    /// (by default) `resource_id` from [`current_span`] if one is installed.
    /// Returns the span plus the metadata headers to attach to the wire
    /// request.
    #[must_use]
    pub fn start_client_span(&self, method: &str, request_resource_id: Option<&str>) -> (Span, Metadata) {
        let parent = current_span();
        let trace_id = parent.as_ref().map(|p| p.trace_id.clone()).unwrap_or_else(new_id);
        let parent_span_id = parent.as_ref().map(|p| p.span_id.clone());
        let resource_id = request_resource_id
            .map(str::to_string)
            .or_else(|| parent.as_ref().and_then(|p| p.resource_id.clone()));

        let mut span = Span::start(
            trace_id,
            new_id(),
            parent_span_id,
            format!("{}.{method}", self.service_name),
            SpanKind::Client,
            self.service_name.clone(),
            Utc::now(),
        );
        span.resource_id = resource_id.clone();
        span.set_attribute("rpc_service", &self.service_name);
        span.set_attribute("rpc_method", method);

        let mut metadata = Metadata::new();
        metadata.insert(TRACE_ID_HEADER.to_string(), span.trace_id.clone());
        metadata.insert(SPAN_ID_HEADER.to_string(), span.span_id.clone());
        if let Some(resource_id) = resource_id {
            metadata.insert(RESOURCE_ID_HEADER.to_string(), resource_id);
        }
        (span, metadata)
    }

    async fn observe_server<F, T>(&self, span: Span, completion_event: &'static str, handler: F) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        self.observe(span, "request_received", completion_event, handler).await
    }

    async fn observe<F, T>(
        &self,
        mut span: Span,
        start_event: &'static str,
        completion_event: &'static str,
        handler: F,
    ) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        span.add_event(SpanEvent::new(Utc::now(), start_event));
        let trace_id = span.trace_id.clone();
        let span_id = span.span_id.clone();
        let service_name = span.service_name.clone();

        let (result, mut span) = with_span(span.clone(), async move {
            let result = handler.await;
            (result, span)
        })
        .await;

        span.add_event(SpanEvent::new(Utc::now(), completion_event));
        match &result {
            Ok(_) => span.end(SpanStatus::ok(), Utc::now()),
            Err(err) => {
                tracing::debug!(trace_id = %span.trace_id, span_id = %span.span_id, %err, "call failed");
                span.end(SpanStatus::error(err.message.clone()), Utc::now());
            }
        }
        self.sink.record_span(span).await;

        result.map_err(|err| {
            err.with_context("trace_id", &trace_id)
                .with_context("span_id", &span_id)
                .with_context("service_name", &service_name)
        })
    }

    /// Wraps a unary server handler: installs `span` as current for the
    /// duration of `handler`, records `request_received`/`response_sent`
    /// events, sets the span's terminal status from the outcome, finalizes
    /// it exactly once, and hands it to the sink.
    pub async fn observe_server_unary_call<F, T>(&self, span: Span, handler: F) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        self.observe_server(span, "response_sent", handler).await
    }

    /// As [`Self::observe_server_unary_call`], but records `stream_ended`
    /// instead of `response_sent` on completion.
    pub async fn observe_server_streaming_call<F, T>(&self, span: Span, handler: F) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        self.observe_server(span, "stream_ended", handler).await
    }

    /// Wraps a unary client call the same way as
    /// [`Self::observe_server_unary_call`], for a CLIENT span.
    pub async fn observe_client_unary_call<F, T>(&self, span: Span, handler: F) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        self.observe(span, "request_sent", "response_received", handler).await
    }

    /// As [`Self::observe_client_unary_call`], but records `stream_ended`
    /// instead of `response_received` on completion.
    pub async fn observe_client_streaming_call<F, T>(&self, span: Span, handler: F) -> Result<T, FleetError>
    where
        F: Future<Output = Result<T, FleetError>>,
    {
        self.observe(span, "request_sent", "stream_ended", handler).await
    }
}
