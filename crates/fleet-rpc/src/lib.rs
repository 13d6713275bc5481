// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authenticated HTTP/2 RPC runtime: HMAC signer/verifier, a shared retry
//! policy, the compiled service registry, an Axum server wrapper with
//! unary/streaming handler glue, and a reqwest client wrapper with unary
//! and streaming calls — both sides observed end-to-end via
//! `fleet-tracer`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod client;
mod handler;
mod keepalive;
mod registry;
mod retry;
mod rpc;
mod server;
mod status;
mod trace_sink;

pub use auth::{AuthConfig, DEFAULT_LIFETIME};
pub use client::{Client, resolve_target_url};
pub use handler::{handle_streaming, handle_unary, metadata_from_headers};
pub use keepalive::KeepaliveConfig;
pub use registry::{ServiceDefinition, service_definition};
pub use retry::RetryPolicy;
pub use rpc::Rpc;
pub use server::{DEFAULT_REQUEST_TIMEOUT, Server, ServiceLifecycle, error_response, idle_timeout, shutdown_signal};
pub use status::{code_for_status, status_for_code};
pub use trace_sink::CollectorSink;
