//! Exercises the [`fleet_rpc::Client`] wrapper end to end against a real
//! [`fleet_rpc::Server`]: signing, request/response, and trace attachment.

use axum::Json;
use axum::routing::post;
use fleet_rpc::{AuthConfig, Client, Server};
use fleet_tracer::{NullSink, Tracer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    value: u32,
}

async fn handle_ping(Json(req): Json<Ping>) -> Json<Ping> {
    Json(Ping { value: req.value + 1 })
}

#[tokio::test]
async fn client_round_trips_through_server() {
    let secret = "s".repeat(32);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = axum::Router::new().route("/Echo.Ping", post(handle_ping));
    let server = Server::new(AuthConfig::new(secret.clone()).unwrap()).merge(app);
    let server_task = tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let tracer = Tracer::new("echo-client", Arc::new(NullSink));
    let client = Client::new("echo-client", format!("http://{addr}"), AuthConfig::new(secret).unwrap(), tracer).unwrap();

    let response: Ping = client.call_unary("Echo.Ping", &Ping { value: 41 }, None, None).await.unwrap();
    assert_eq!(response.value, 42);

    server_task.abort();
}

async fn handle_slow(Json(req): Json<Ping>) -> Json<Ping> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(req)
}

#[tokio::test]
async fn slow_handler_is_cancelled_at_the_request_deadline() {
    let secret = "s".repeat(32);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = axum::Router::new().route("/Echo.Slow", post(handle_slow));
    let server = Server::new(AuthConfig::new(secret.clone()).unwrap())
        .with_request_timeout(Duration::from_millis(200))
        .merge(app);
    let server_task = tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let tracer = Tracer::new("echo-client", Arc::new(NullSink));
    let client = Client::new("echo-client", format!("http://{addr}"), AuthConfig::new(secret).unwrap(), tracer).unwrap();

    let err = client.call_unary::<Ping, Ping>("Echo.Slow", &Ping { value: 1 }, None, None).await.unwrap_err();
    assert_eq!(err.code, fleet_error::ErrorCode::Cancelled);

    server_task.abort();
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = axum::Router::new().route("/Echo.Ping", post(handle_ping));
    let server = Server::new(AuthConfig::new("a".repeat(32)).unwrap()).merge(app);
    let server_task = tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let tracer = Tracer::new("echo-client", Arc::new(NullSink));
    let client = Client::new("echo-client", format!("http://{addr}"), AuthConfig::new("b".repeat(32)).unwrap(), tracer).unwrap();

    let err = client.call_unary::<Ping, Ping>("Echo.Ping", &Ping { value: 1 }, None, None).await.unwrap_err();
    assert_eq!(err.code, fleet_error::ErrorCode::Unauthenticated);

    server_task.abort();
}
