//! Reproduces the three-hop trace propagation scenario: client A calls
//! server B, B makes a nested call to server C, and all three spans land
//! in one trace with the expected parent chain.

use async_trait::async_trait;
use fleet_core::Span;
use fleet_error::FleetError;
use fleet_tracer::{Tracer, TraceSink};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    spans: Mutex<Vec<Span>>,
}

#[async_trait]
impl TraceSink for RecordingSink {
    async fn record_span(&self, span: Span) {
        self.spans.lock().unwrap().push(span);
    }
}

#[tokio::test]
async fn trace_id_is_shared_across_three_hops() {
    let sink = Arc::new(RecordingSink::default());
    let tracer_a = Tracer::new("A", sink.clone());
    let tracer_b = Tracer::new("B", sink.clone());
    let tracer_c = Tracer::new("C", sink.clone());

    let (client_span_ab, metadata_ab) = tracer_a.start_client_span("Call", None);
    let trace_id = client_span_ab.trace_id.clone();

    tracer_a
        .observe_client_unary_call(client_span_ab, async {
            let server_span_b = tracer_b.start_server_span("Call", None, &metadata_ab);
            tracer_b
                .observe_server_unary_call(server_span_b, async {
                    let (client_span_bc, metadata_bc) = tracer_b.start_client_span("Call", None);
                    let client_span_bc_id = client_span_bc.span_id.clone();
                    tracer_b
                        .observe_client_unary_call(client_span_bc, async {
                            let server_span_c = tracer_c.start_server_span("Call", None, &metadata_bc);
                            assert_eq!(server_span_c.parent_span_id.as_deref(), Some(client_span_bc_id.as_str()));
                            tracer_c
                                .observe_server_unary_call(server_span_c, async { Ok::<_, FleetError>(()) })
                                .await
                        })
                        .await
                })
                .await
        })
        .await
        .unwrap();

    let spans = sink.spans.lock().unwrap();
    assert_eq!(spans.len(), 4, "client A->B, server B, client B->C, server C are each recorded");
    assert!(spans.iter().all(|s| s.trace_id == trace_id));
    assert!(spans.iter().all(|s| s.is_finished()));
}

#[tokio::test]
async fn server_span_adopts_request_resource_id_over_header() {
    let sink = Arc::new(RecordingSink::default());
    let tracer = Tracer::new("B", sink);
    let mut metadata = fleet_tracer::Metadata::new();
    metadata.insert("x-resource-id".to_string(), "from-header".to_string());

    let span = tracer.start_server_span("Call", Some("from-request"), &metadata);
    assert_eq!(span.resource_id.as_deref(), Some("from-request"));
}
