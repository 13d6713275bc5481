//! Handler glue: every route a fleet service registers goes through
//! [`handle_unary`] or [`handle_streaming`], which validate the request,
//! thread the server span through the handler, and shape the response.

use crate::server::error_response;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use fleet_error::{FleetError, FleetErrorDto};
use fleet_tracer::{Metadata, RESOURCE_ID_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER, Tracer};
use serde::Serialize;
use std::future::Future;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

/// Copy the trace propagation headers out of an incoming request into the
/// tracer's metadata carrier.
#[must_use]
pub fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();
    for key in [TRACE_ID_HEADER, SPAN_ID_HEADER, RESOURCE_ID_HEADER] {
        if let Some(value) = headers.get(key).and_then(|v| v.to_str().ok()) {
            metadata.insert(key.to_string(), value.to_string());
        }
    }
    metadata
}

/// Serve one unary call: reject an absent request body as invalid, start
/// the SERVER span from the incoming headers, run `handler` inside the
/// span's context, and shape the outcome into a JSON response or a mapped
/// error status.
///
/// `resource_id` is the request's own `resource_id` field when it has one;
/// it wins over the `x-resource-id` header.
pub async fn handle_unary<Req, Resp, F, Fut>(
    tracer: &Tracer,
    method: &str,
    headers: &HeaderMap,
    request: Option<Req>,
    resource_id: Option<String>,
    handler: F,
) -> Response
where
    Resp: Serialize,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Resp, FleetError>>,
{
    let Some(request) = request else {
        return error_response(FleetError::invalid_argument(format!("{method} called without a request body")));
    };
    let metadata = metadata_from_headers(headers);
    let span = tracer.start_server_span(method, resource_id.as_deref(), &metadata);
    match tracer.observe_server_unary_call(span, handler(request)).await {
        Ok(response) => axum::Json(response).into_response(),
        Err(err) => error_response(err),
    }
}

/// Serve one server-streaming call as newline-delimited JSON.
///
/// The SERVER span stays open while chunks flow; it is finalized with
/// `stream_ended` when the handler's stream completes, errors, or the
/// consumer goes away. An in-stream error is emitted as a final
/// `{"error": ...}` line before the body ends, matching what
/// [`crate::Client::call_stream`] decodes on the other side.
pub async fn handle_streaming<Req, Resp, S, F, Fut>(
    tracer: &Tracer,
    method: &str,
    headers: &HeaderMap,
    request: Option<Req>,
    resource_id: Option<String>,
    handler: F,
) -> Response
where
    Req: Send + 'static,
    Resp: Serialize + Send + 'static,
    S: Stream<Item = Result<Resp, FleetError>> + Send + 'static,
    F: FnOnce(Req) -> Fut + Send + 'static,
    Fut: Future<Output = Result<S, FleetError>> + Send,
{
    let Some(request) = request else {
        return error_response(FleetError::invalid_argument(format!("{method} called without a request body")));
    };
    let metadata = metadata_from_headers(headers);
    let span = tracer.start_server_span(method, resource_id.as_deref(), &metadata);

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>, std::convert::Infallible>>(16);
    let tracer = tracer.clone();
    tokio::spawn(async move {
        let emit_error = |err: &FleetError| {
            let dto = FleetErrorDto::from(err);
            let mut line = serde_json::to_vec(&serde_json::json!({ "error": dto })).unwrap_or_default();
            line.push(b'\n');
            line
        };
        let drain = async {
            // The stream is opened inside the span context so any nested
            // client call made while opening parents correctly.
            let stream = match handler(request).await {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = tx.send(Ok(emit_error(&err))).await;
                    return Err(err);
                }
            };
            let mut stream = std::pin::pin!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        let mut line = serde_json::to_vec(&chunk).map_err(|e| {
                            FleetError::internal(format!("failed to encode stream chunk: {e}"))
                        })?;
                        line.push(b'\n');
                        if tx.send(Ok(line)).await.is_err() {
                            // Consumer hung up; stop producing.
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Ok(emit_error(&err))).await;
                        return Err(err);
                    }
                }
            }
            Ok(())
        };
        let _ = tracer.observe_server_streaming_call(span, drain).await;
    });

    Response::builder()
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| error_response(FleetError::internal("failed to build stream response")))
}
