//! Reproduces the auth-rejection-after-expiry scenario: a token signed
//! with a 1s lifetime is accepted on first use and rejected 1.2s later.

use axum::Json;
use axum::routing::post;
use fleet_rpc::{AuthConfig, Server};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize, Deserialize)]
struct Ping {
    value: u32,
}

async fn handle_ping(Json(req): Json<Ping>) -> Json<Ping> {
    Json(Ping { value: req.value + 1 })
}

#[tokio::test]
async fn token_accepted_then_rejected_past_lifetime() {
    let secret = "s".repeat(32);
    let server_auth = AuthConfig::with_lifetime(secret.clone(), Duration::from_secs(1)).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = axum::Router::new().route("/Echo.Ping", post(handle_ping));
    let server = Server::new(server_auth).merge(app);
    let server_task = tokio::spawn(server.serve(addr, async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client_auth = AuthConfig::with_lifetime(secret, Duration::from_secs(1)).unwrap();
    let token = client_auth.sign("echo-client");
    let http = reqwest::Client::new();
    let url = format!("http://{addr}/Echo.Ping");

    let first = http
        .post(&url)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&Ping { value: 1 })
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let second = http
        .post(&url)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&Ping { value: 1 })
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: fleet_error::FleetErrorDto = second.json().await.unwrap();
    assert_eq!(body.code, fleet_error::ErrorCode::Unauthenticated);
    assert_eq!(body.message, "Token has expired");

    server_task.abort();
}
