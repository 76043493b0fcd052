//! Breaker-guarded outbound HTTP client.
//!
//! # Responsibilities
//! - Hold one hyper client per service (each with its own connect timeout)
//! - Run every attempt through the service's breaker and per-call deadline
//! - Classify transport failures once: timeout, connection, upstream
//! - Retry safe requests on transport failures with backoff
//! - Keep every attempt and backoff inside the request deadline
//!
//! # Design Decisions
//! - Each guarded attempt runs on its own task; if the caller goes away the
//!   breaker still sees the real outcome instead of an abandoned permit
//! - Upstream bodies are buffered up to a configured limit; a body cut short
//!   by the peer is a connection failure, only an oversized one is upstream
//!   garbage

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, Uri},
};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::proxy::ProxyMethod;
use crate::registry::{BreakerRegistry, ServiceDescriptor, ServiceRegistry};
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::{is_retryable, max_attempts};
use crate::resilience::timeouts::{attempt_budget, with_deadline};
use crate::resilience::{BreakerError, CallOutcome, CircuitBreaker, Deadline};

type HttpClient = Client<HttpConnector, Body>;

/// A fully prepared outbound call.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: ProxyMethod,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub deadline: Option<Deadline>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: ProxyMethod::Get,
            path: path.into(),
            query: None,
            headers,
            body: None,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Buffered upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Outbound client shared by the forwarder and the aggregation layer.
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    registry: Arc<ServiceRegistry>,
    breakers: Arc<BreakerRegistry>,
    clients: HashMap<String, HttpClient>,
    backoff: Backoff,
    max_response_bytes: usize,
}

impl ResilientClient {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        breakers: Arc<BreakerRegistry>,
        backoff: Backoff,
        max_response_bytes: usize,
    ) -> Self {
        let clients = registry
            .iter()
            .map(|d| (d.name.clone(), build_client(d.connect_timeout)))
            .collect();
        Self {
            inner: Arc::new(ClientInner {
                registry,
                breakers,
                clients,
                backoff,
                max_response_bytes,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.inner.registry
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.inner.breakers
    }

    /// Issue `request` to `service`, retrying safe methods on transport failures.
    ///
    /// With a request deadline, each attempt gets the smaller of the service
    /// timeout and the time left, and no retry starts that could not finish
    /// its backoff in time.
    pub async fn send(&self, service: &str, request: OutboundRequest) -> Result<UpstreamReply, GatewayError> {
        let descriptor = self.inner.registry.resolve(service)?;
        let breaker = self.inner.breakers.get(service)?;
        let client = self
            .inner
            .clients
            .get(service)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))?;

        let url = descriptor.target_url(&request.path, request.query.as_deref());
        let uri: Uri = url
            .parse()
            .map_err(|e| GatewayError::BadRequest(format!("invalid target path: {}", e)))?;

        let attempts = max_attempts(request.method, descriptor.retries);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let timeout = attempt_budget(descriptor.timeout, request.deadline);
            if timeout.is_zero() {
                return Err(GatewayError::Timeout {
                    service: service.to_string(),
                    after: descriptor.timeout,
                });
            }

            let result = self
                .attempt(descriptor, timeout, &breaker, &client, &uri, &request)
                .await;
            match result {
                Err(e) if attempt < attempts && is_retryable(request.method, &e) => {
                    let delay = self.inner.backoff.delay(attempt);
                    if request.deadline.is_some_and(|d| d.remaining() <= delay) {
                        tracing::debug!(
                            service = %service,
                            attempt,
                            "Request deadline leaves no time for another attempt"
                        );
                        return Err(e);
                    }
                    tracing::info!(
                        service = %service,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn attempt(
        &self,
        descriptor: &ServiceDescriptor,
        timeout: Duration,
        breaker: &Arc<CircuitBreaker>,
        client: &HttpClient,
        uri: &Uri,
        request: &OutboundRequest,
    ) -> Result<UpstreamReply, GatewayError> {
        let mut outbound = Request::builder()
            .method(request.method.as_http())
            .uri(uri.clone())
            .body(request.body.clone().map(Body::from).unwrap_or_else(Body::empty))
            .map_err(|e| GatewayError::Internal(format!("failed to build outbound request: {}", e)))?;
        *outbound.headers_mut() = request.headers.clone();

        let service = descriptor.name.clone();
        let trip_on_server_error = descriptor.trip_on_server_error;
        let limit = self.inner.max_response_bytes;
        let breaker = Arc::clone(breaker);
        let client = client.clone();

        let task = tokio::spawn(async move {
            breaker
                .call_classified(
                    || with_deadline(&service, timeout, exchange(&client, outbound, &service, limit)),
                    |result| classify(result, trip_on_server_error),
                )
                .await
        });

        match task.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(BreakerError::Open)) => Err(GatewayError::CircuitOpen {
                service: descriptor.name.clone(),
            }),
            Ok(Err(BreakerError::Inner(e))) => Err(e),
            Err(e) => Err(GatewayError::Internal(format!("outbound task failed: {}", e))),
        }
    }
}

fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// One HTTP exchange with the body fully buffered.
async fn exchange(
    client: &HttpClient,
    request: Request<Body>,
    service: &str,
    limit: usize,
) -> Result<UpstreamReply, GatewayError> {
    let response = client
        .request(request)
        .await
        .map_err(|e| GatewayError::Connection {
            service: service.to_string(),
            source: Box::new(e),
        })?;

    let (parts, body) = response.into_parts();
    let body = read_body(Body::new(body), service, limit).await?;

    Ok(UpstreamReply {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// Buffer `body` up to `limit` bytes.
async fn read_body(body: Body, service: &str, limit: usize) -> Result<Bytes, GatewayError> {
    let mut stream = body.into_data_stream();
    let mut buffered = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GatewayError::Connection {
            service: service.to_string(),
            source: Box::new(e),
        })?;
        if buffered.len() + chunk.len() > limit {
            return Err(GatewayError::Upstream {
                service: service.to_string(),
                reason: format!("response body exceeds {} bytes", limit),
            });
        }
        buffered.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffered))
}

/// Breaker classification: every error is a failure; gateway-class statuses
/// only when the service opts in.
fn classify(result: &Result<UpstreamReply, GatewayError>, trip_on_server_error: bool) -> CallOutcome {
    match result {
        Ok(reply)
            if trip_on_server_error
                && matches!(
                    reply.status,
                    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
                ) =>
        {
            CallOutcome::Failure
        }
        Ok(_) => CallOutcome::Success,
        Err(_) => CallOutcome::Failure,
    }
}
