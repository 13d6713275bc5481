//! Axum-based RPC server: auth middleware, graceful shutdown, and the
//! `observe_server_*` span wrapping every handler goes through.

use crate::auth::AuthConfig;
use crate::keepalive::KeepaliveConfig;
use crate::status::status_for_code;
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use fleet_error::{ErrorCode, FleetError, FleetErrorDto};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::{BoxError, ServiceBuilder, timeout::TimeoutLayer};

/// A server bound to one auth config, ready to have routes registered and
/// be served.
pub struct Server {
    router: Router,
    auth: Arc<AuthConfig>,
    keepalive: KeepaliveConfig,
    request_timeout: Duration,
}

impl Server {
    /// Start with no routes, verifying every request against `auth`.
    #[must_use]
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            router: Router::new(),
            auth: Arc::new(auth),
            keepalive: KeepaliveConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request deadline. A handler that has not produced
    /// its response (for streams, the response head) within this window is
    /// cancelled and the caller sees `CANCELLED`.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Override the default keepalive parameters.
    ///
    /// `axum::serve` does not expose per-connection HTTP/2 ping tuning
    /// without a `hyper_util` server builder, which isn't in this stack;
    /// the config is still recorded here so a future server-side client
    /// (or ops dashboard) has one place to read it from, and so the value
    /// this crate hands to [`crate::client::Client`] for the matching
    /// client-side settings stays in sync.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// The keepalive parameters this server was built with.
    #[must_use]
    pub fn keepalive(&self) -> KeepaliveConfig {
        self.keepalive
    }

    /// Merge `router` in under its own route table, e.g. one
    /// `Router::new().route("/Agent.Run", post(handler))` per RPC method.
    #[must_use]
    pub fn merge(mut self, router: Router) -> Self {
        self.router = self.router.merge(router);
        self
    }

    /// Bind and serve forever, running `shutdown` to completion to trigger
    /// a graceful stop. The auth middleware is layered on last so it sees
    /// every route registered by [`Self::merge`].
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), FleetError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self
            .router
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(timed_out))
                    .layer(TimeoutLayer::new(self.request_timeout)),
            )
            .layer(middleware::from_fn_with_state(self.auth.clone(), verify_auth));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("bind {addr} failed: {e}")).with_source(e))?;

        tracing::debug!(%addr, ping_interval = ?self.keepalive.ping_interval, "server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("server error: {e}")).with_source(e))
    }

    /// Serve until SIGINT/SIGTERM, running `service`'s shutdown hook before
    /// the graceful close begins.
    pub async fn serve_until_signal(
        self,
        addr: SocketAddr,
        service: Arc<dyn ServiceLifecycle>,
    ) -> Result<(), FleetError> {
        self.serve(addr, async move {
            shutdown_signal().await;
            service.shutdown().await;
        })
        .await
    }
}

/// Hook a service implementation exposes so the server can drain it
/// before closing the listener.
#[async_trait::async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Called once when the server begins graceful shutdown, before the
    /// listener stops accepting. The default does nothing.
    async fn shutdown(&self) {}
}

/// Waits for either a ctrl-c or SIGTERM; the default `shutdown` future for
/// [`Server::serve`] outside of tests.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Default per-request deadline; generous because LLM-backed handlers are
/// slow, but finite so a wedged handler cannot hold a connection forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

async fn timed_out(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        error_response(FleetError::new(ErrorCode::Cancelled, "request deadline exceeded"))
    } else {
        error_response(FleetError::internal(err.to_string()))
    }
}

async fn verify_auth(State(auth): State<Arc<AuthConfig>>, req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return error_response(FleetError::new(ErrorCode::Unauthenticated, "missing authorization header"));
    };

    match auth.verify(token) {
        Ok(_service_id) => next.run(req).await,
        Err(err) => error_response(err),
    }
}

/// Translate a [`FleetError`] into the HTTP response a client expects:
/// the mapped status code plus a JSON [`FleetErrorDto`] body.
pub fn error_response(err: FleetError) -> Response {
    let status = status_for_code(err.code);
    let dto = FleetErrorDto::from(&err);
    (status, axum::Json(dto)).into_response()
}

/// How long an idle keepalive-only connection may sit before the server
/// decides it's time to time it out; derived from [`KeepaliveConfig`]
/// rather than duplicated as a separate knob.
#[must_use]
pub fn idle_timeout(keepalive: &KeepaliveConfig) -> Duration {
    keepalive.ping_interval + keepalive.ping_ack_timeout
}
