//! Trace propagation across real HTTP hops: a client calls service B,
//! whose handler makes a nested call to service C. Every span lands in one
//! shared sink with a single trace id and the right parent chain.

use async_trait::async_trait;
use axum::Json;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use fleet_core::{Span, SpanKind};
use fleet_rpc::{AuthConfig, Client, Server, handle_unary};
use fleet_tracer::{TraceSink, Tracer};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

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

#[derive(Serialize, Deserialize)]
struct Echo {
    value: u32,
}

fn secret() -> String {
    "s".repeat(32)
}

async fn reserve_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Service C: answers directly.
async fn spawn_leaf(sink: Arc<RecordingSink>) -> SocketAddr {
    let addr = reserve_addr().await;
    let tracer = Tracer::new("C", sink);

    let handler = move |headers: HeaderMap, request: Option<Json<Echo>>| {
        let tracer = tracer.clone();
        async move {
            handle_unary(
                &tracer,
                "Leaf.Echo",
                &headers,
                request.map(|Json(r)| r),
                None,
                |req: Echo| async move { Ok(Echo { value: req.value * 2 }) },
            )
            .await
        }
    };

    let app = axum::Router::new().route("/Leaf.Echo", post(handler));
    let server = Server::new(AuthConfig::new(secret()).unwrap()).merge(app);
    tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }));
    addr
}

/// Service B: forwards to C from inside its own observed handler.
async fn spawn_relay(sink: Arc<RecordingSink>, leaf_addr: SocketAddr) -> SocketAddr {
    let addr = reserve_addr().await;
    let tracer = Tracer::new("B", sink);
    let leaf_client = Arc::new(
        Client::new("B", format!("http://{leaf_addr}"), AuthConfig::new(secret()).unwrap(), tracer.clone()).unwrap(),
    );

    let handler = move |headers: HeaderMap, request: Option<Json<Echo>>| {
        let tracer = tracer.clone();
        let leaf_client = leaf_client.clone();
        async move {
            handle_unary(
                &tracer,
                "Relay.Echo",
                &headers,
                request.map(|Json(r)| r),
                None,
                |req: Echo| async move { leaf_client.call_unary::<Echo, Echo>("Leaf.Echo", &req, None, None).await },
            )
            .await
        }
    };

    let app = axum::Router::new().route("/Relay.Echo", post(handler));
    let server = Server::new(AuthConfig::new(secret()).unwrap()).merge(app);
    tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }));
    addr
}

#[tokio::test]
async fn nested_call_shares_one_trace_with_the_right_parent_chain() {
    let sink = Arc::new(RecordingSink::default());

    let leaf_addr = spawn_leaf(sink.clone()).await;
    let relay_addr = spawn_relay(sink.clone(), leaf_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let tracer_a = Tracer::new("A", sink.clone());
    let client = Client::new("A", format!("http://{relay_addr}"), AuthConfig::new(secret()).unwrap(), tracer_a).unwrap();

    let response: Echo = client.call_unary("Relay.Echo", &Echo { value: 21 }, None, None).await.unwrap();
    assert_eq!(response.value, 42);

    let spans = sink.spans.lock().unwrap();
    assert_eq!(spans.len(), 4, "client A, server B, client B->C, server C");

    let trace_id = &spans[0].trace_id;
    assert!(spans.iter().all(|s| s.trace_id == *trace_id));
    assert!(spans.iter().all(|s| s.is_finished()));

    let server_c = spans
        .iter()
        .find(|s| s.kind == SpanKind::Server && s.service_name == "C")
        .expect("server span at C");
    let client_bc = spans
        .iter()
        .find(|s| s.kind == SpanKind::Client && s.service_name == "B")
        .expect("client span B->C");
    let server_b = spans
        .iter()
        .find(|s| s.kind == SpanKind::Server && s.service_name == "B")
        .expect("server span at B");
    let client_ab = spans
        .iter()
        .find(|s| s.kind == SpanKind::Client && s.service_name == "A")
        .expect("client span A->B");

    assert_eq!(server_c.parent_span_id.as_deref(), Some(client_bc.span_id.as_str()));
    assert_eq!(client_bc.parent_span_id.as_deref(), Some(server_b.span_id.as_str()));
    assert_eq!(server_b.parent_span_id.as_deref(), Some(client_ab.span_id.as_str()));
    assert!(client_ab.parent_span_id.is_none());
}
