//! Reqwest-based RPC client: HMAC signing, retry, trace propagation,
//! unary and streaming calls, and the `0.0.0.0` → fleet-DNS host
//! substitution for in-mesh dialing.

use crate::auth::AuthConfig;
use crate::keepalive::KeepaliveConfig;
use crate::retry::RetryPolicy;
use crate::status::code_for_status;
use fleet_error::{ErrorCode, FleetError, FleetErrorDto};
use fleet_tracer::Tracer;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

/// Derive the base URL a client should dial for `target_service_name`,
/// substituting a well-known in-mesh DNS name whenever the configured
/// host is the unspecified address.
#[must_use]
pub fn resolve_target_url(target_service_name: &str, config: &fleet_config::Config) -> String {
    let protocol = config.get("protocol").and_then(|v| v.as_str()).unwrap_or("grpc");
    let scheme = if protocol == "grpc" { "http" } else { protocol };
    let host = config.get("host").and_then(|v| v.as_str()).unwrap_or("0.0.0.0");
    let host = if host == "0.0.0.0" {
        format!("{target_service_name}.fleet.internal")
    } else {
        host.to_string()
    };
    let port = config.get("port").and_then(|v| v.as_u64()).unwrap_or(3000);
    let path = config.get("path").and_then(|v| v.as_str()).unwrap_or("");
    format!("{scheme}://{host}:{port}{path}")
}

/// One client bound to a calling service identity, a target base URL, and
/// a shared auth/retry/tracing policy.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    auth: AuthConfig,
    calling_service_id: String,
    retry: RetryPolicy,
    tracer: Tracer,
}

impl Client {
    /// Build a client for `calling_service_id` dialing `base_url`.
    pub fn new(calling_service_id: impl Into<String>, base_url: impl Into<String>, auth: AuthConfig, tracer: Tracer) -> Result<Self, FleetError> {
        Self::with_keepalive(calling_service_id, base_url, auth, tracer, KeepaliveConfig::default())
    }

    /// As [`Self::new`], with explicit keepalive tuning.
    pub fn with_keepalive(
        calling_service_id: impl Into<String>,
        base_url: impl Into<String>,
        auth: AuthConfig,
        tracer: Tracer,
        keepalive: KeepaliveConfig,
    ) -> Result<Self, FleetError> {
        let http = reqwest::Client::builder()
            .http2_prior_knowledge()
            .http2_keep_alive_interval(keepalive.ping_interval)
            .http2_keep_alive_timeout(keepalive.ping_ack_timeout)
            .http2_keep_alive_while_idle(keepalive.permit_without_calls)
            .build()
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("failed to build http client: {e}")).with_source(e))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            auth,
            calling_service_id: calling_service_id.into(),
            retry: RetryPolicy::default(),
            tracer,
        })
    }

    /// Override the default [`RetryPolicy`].
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issue a unary call to `method`, observed end-to-end by the tracer
    /// and retried per policy until success, a non-retryable error, the
    /// attempt budget, or `deadline`.
    pub async fn call_unary<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        resource_id: Option<&str>,
        deadline: Option<Instant>,
    ) -> Result<Resp, FleetError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let (span, metadata) = self.tracer.start_client_span(method, resource_id);
        self.tracer
            .observe_client_unary_call(span, self.retry.run(deadline, || self.send_once(method, request, &metadata)))
            .await
    }

    /// As [`Self::call_unary`], applying `mapper` to the decoded response.
    pub async fn call_unary_mapped<Req, Resp, T>(
        &self,
        method: &str,
        request: &Req,
        resource_id: Option<&str>,
        deadline: Option<Instant>,
        mapper: impl FnOnce(Resp) -> T,
    ) -> Result<T, FleetError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.call_unary(method, request, resource_id, deadline).await.map(mapper)
    }

    /// Open a server stream on `method` and return its chunks as they
    /// arrive, decoded from newline-delimited JSON.
    ///
    /// Connect-time failures go through the retry policy; once the first
    /// chunk has been received the stream counts as connected and any later
    /// failure propagates as an `Err` item without further retry. A final
    /// `{"error": ...}` line from the server surfaces the same way. The
    /// CLIENT span stays open for the stream's whole lifetime and is
    /// finalized when it ends, errors, or the consumer drops the stream.
    pub fn call_stream<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        resource_id: Option<&str>,
        deadline: Option<Instant>,
    ) -> impl Stream<Item = Result<Resp, FleetError>> + Send + use<Req, Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Send + 'static,
    {
        let (span, metadata) = self.tracer.start_client_span(method, resource_id);
        let body = serde_json::to_vec(request);
        let method = method.to_string();
        let url = format!("{}/{}", self.base_url, method);
        let http = self.http.clone();
        let auth = self.auth.clone();
        let service_id = self.calling_service_id.clone();
        let retry = self.retry;
        let tracer = self.tracer.clone();

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Resp, FleetError>>(16);
        tokio::spawn(async move {
            let drive = async {
                let body = match body {
                    Ok(body) => body,
                    Err(e) => {
                        let err = FleetError::internal(format!("failed to encode {method} request: {e}"));
                        return Err(deliver_err(&tx, err).await);
                    }
                };

                let connected = retry
                    .run(deadline, || {
                        let mut builder = http
                            .post(&url)
                            .header(AUTHORIZATION, format!("Bearer {}", auth.sign(&service_id)))
                            .header(CONTENT_TYPE, "application/json")
                            .body(body.clone());
                        for (key, value) in &metadata {
                            builder = builder.header(key.as_str(), value.as_str());
                        }
                        let method = &method;
                        async move {
                            let response = builder.send().await.map_err(|e| {
                                FleetError::new(ErrorCode::Unavailable, format!("{method} stream connect failed: {e}"))
                                    .with_source(e)
                            })?;
                            let status = response.status();
                            if !status.is_success() {
                                let text = response.text().await.unwrap_or_default();
                                return Err(FleetError::new(code_for_status(status), text));
                            }
                            Ok(response)
                        }
                    })
                    .await;
                let response = match connected {
                    Ok(response) => response,
                    Err(err) => return Err(deliver_err(&tx, err).await),
                };

                let mut buffer: Vec<u8> = Vec::new();
                let mut bytes = std::pin::pin!(response.bytes_stream());
                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            let err = FleetError::new(ErrorCode::Unavailable, format!("{method} stream failed: {e}"))
                                .with_source(e);
                            return Err(deliver_err(&tx, err).await);
                        }
                    };
                    buffer.extend_from_slice(&chunk);
                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = &line[..line.len() - 1];
                        if line.is_empty() {
                            continue;
                        }
                        match decode_stream_line::<Resp>(&method, line) {
                            Ok(item) => {
                                if tx.send(Ok(item)).await.is_err() {
                                    // Consumer dropped the stream.
                                    return Ok(());
                                }
                            }
                            Err(err) => return Err(deliver_err(&tx, err).await),
                        }
                    }
                }
                Ok(())
            };
            let _ = tracer.observe_client_streaming_call(span, drive).await;
        });

        ReceiverStream::new(rx)
    }

    /// As [`Self::call_stream`], piping every chunk through `mapper`.
    pub fn call_stream_mapped<Req, Resp, T>(
        &self,
        method: &str,
        request: &Req,
        resource_id: Option<&str>,
        deadline: Option<Instant>,
        mut mapper: impl FnMut(Resp) -> T + Send + 'static,
    ) -> impl Stream<Item = Result<T, FleetError>> + Send
    where
        Req: Serialize,
        Resp: DeserializeOwned + Send + 'static,
        T: Send + 'static,
    {
        self.call_stream::<Req, Resp>(method, request, resource_id, deadline)
            .map(move |item| item.map(&mut mapper))
    }

    async fn send_once<Req, Resp>(&self, method: &str, request: &Req, metadata: &fleet_tracer::Metadata) -> Result<Resp, FleetError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let token = self.auth.sign(&self.calling_service_id);

        let mut builder = self.http.post(&url).json(request).header(AUTHORIZATION, format!("Bearer {token}"));
        for (key, value) in metadata {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            FleetError::new(ErrorCode::Unavailable, format!("{method} request failed: {e}")).with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::new(code_for_status(status), body));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| FleetError::new(ErrorCode::Internal, format!("malformed {method} response: {e}")).with_source(e))
    }
}

/// Decode one NDJSON line from a server stream: either a `Resp` chunk or
/// the in-band `{"error": ...}` terminator emitted by the server's
/// streaming handler.
fn decode_stream_line<Resp: DeserializeOwned>(method: &str, line: &[u8]) -> Result<Resp, FleetError> {
    let value: serde_json::Value = serde_json::from_slice(line)
        .map_err(|e| FleetError::internal(format!("malformed {method} stream chunk: {e}")))?;
    if let Some(error) = value.get("error") {
        let dto: FleetErrorDto = serde_json::from_value(error.clone())
            .map_err(|e| FleetError::internal(format!("malformed {method} stream error: {e}")))?;
        let mut err = FleetError::new(dto.code, dto.message);
        err.context = dto.context;
        return Err(err);
    }
    serde_json::from_value(value)
        .map_err(|e| FleetError::internal(format!("malformed {method} stream chunk: {e}")))
}

/// Hand `err` to the stream consumer and return a code/message/context
/// copy for the span observer (the boxed source is not clonable and stays
/// with the copy that reaches the consumer).
async fn deliver_err<T>(tx: &tokio::sync::mpsc::Sender<Result<T, FleetError>>, err: FleetError) -> FleetError {
    let mut copy = FleetError::new(err.code, err.message.clone());
    copy.context = err.context.clone();
    let _ = tx.send(Err(err)).await;
    copy
}
