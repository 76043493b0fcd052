//! Generic reverse-proxy forwarder.

use tokio::time::Instant;

use crate::config::{GatewayIdentityConfig, InvalidJsonPolicy};
use crate::error::GatewayError;
use crate::proxy::body::prepare_body;
use crate::proxy::client::{OutboundRequest, ResilientClient};
use crate::proxy::{ProxyRequest, ProxyResponse};
use crate::security::headers::build_outbound_headers;

/// Forwards one inbound request to a named service and maps the reply back.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: ResilientClient,
    gateway: GatewayIdentityConfig,
    json_policy: InvalidJsonPolicy,
}

impl ProxyForwarder {
    pub fn new(client: ResilientClient, gateway: GatewayIdentityConfig, json_policy: InvalidJsonPolicy) -> Self {
        Self {
            client,
            gateway,
            json_policy,
        }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Forward `request` to `service`.
    ///
    /// Nothing is sent when the service is unknown or the body is rejected.
    pub async fn forward(&self, service: &str, request: ProxyRequest) -> Result<ProxyResponse, GatewayError> {
        let start = Instant::now();
        self.client.registry().resolve(service)?;

        let body = prepare_body(request.method, &request.headers, &request.body, self.json_policy)?;
        let headers = build_outbound_headers(
            &request.headers,
            &request.context,
            request.identity.as_ref(),
            &self.gateway,
        );

        tracing::debug!(
            service = %service,
            request_id = %request.context.request_id,
            method = %request.method,
            path = %request.path,
            "Forwarding request"
        );

        let reply = self
            .client
            .send(
                service,
                OutboundRequest {
                    method: request.method,
                    path: request.path,
                    query: request.query,
                    headers,
                    body,
                    deadline: request.context.deadline,
                },
            )
            .await?;

        ProxyResponse::from_upstream(
            service,
            reply,
            &self.gateway.name,
            &request.context.request_id,
            start.elapsed(),
        )
    }
}
