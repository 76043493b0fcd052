//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Mount one proxy route per registered service
//! - Wire up middleware (request ID, tracing, request deadline, body limit, identity)
//! - Bind server to listener and drain on shutdown
//! - Start the optional background health monitor

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::aggregation::DashboardService;
use crate::config::{ConfigError, GatewayConfig, GatewayIdentityConfig};
use crate::error::GatewayError;
use crate::health::{HealthMonitor, HealthProber};
use crate::http::aggregated;
use crate::http::deadline::enforce_deadline;
use crate::http::request::{request_context, RequestIdExt, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::{ProxyForwarder, ProxyMethod, ProxyRequest, ResilientClient};
use crate::registry::{BreakerRegistry, ServiceRegistry};
use crate::resilience::backoff::Backoff;
use crate::security::{identity_middleware, CallerIdentity, IdentityVerifier};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: ProxyForwarder,
    pub dashboard: Arc<DashboardService>,
    pub prober: Arc<HealthProber>,
    pub registry: Arc<ServiceRegistry>,
    pub breakers: Arc<BreakerRegistry>,
    pub gateway: GatewayIdentityConfig,
    pub max_request_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    prober: Arc<HealthProber>,
}

impl HttpServer {
    /// Create a server whose callers are all anonymous.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Create a server that requires a verified bearer token on `/api/*`.
    pub fn with_identity_verifier(
        config: GatewayConfig,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(verifier))
    }

    fn build(config: GatewayConfig, verifier: Option<Arc<dyn IdentityVerifier>>) -> Result<Self, ConfigError> {
        let registry = Arc::new(ServiceRegistry::from_configs(&config.services).map_err(ConfigError::Validation)?);
        let breakers = Arc::new(BreakerRegistry::from_registry(&registry));

        let client = ResilientClient::new(
            registry.clone(),
            breakers.clone(),
            Backoff::from(&config.retries),
            config.proxy.max_response_body_bytes,
        );
        let prober = Arc::new(HealthProber::new(registry.clone(), breakers.clone(), &config.health_check));
        let dashboard = Arc::new(DashboardService::new(
            client.clone(),
            prober.clone(),
            config.gateway.clone(),
        ));
        let forwarder = ProxyForwarder::new(client, config.gateway.clone(), config.proxy.invalid_json_policy);

        let state = AppState {
            forwarder,
            dashboard,
            prober: prober.clone(),
            registry,
            breakers,
            gateway: config.gateway.clone(),
            max_request_body_bytes: config.proxy.max_request_body_bytes,
        };

        let router = Self::build_router(&config, state, verifier);
        Ok(Self { router, config, prober })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState, verifier: Option<Arc<dyn IdentityVerifier>>) -> Router {
        let mut api = Router::new();
        for descriptor in state.registry.iter() {
            let mount = descriptor.mount_prefix().to_string();
            let service = descriptor.name.clone();
            let handler = {
                let mount = mount.clone();
                move |State(state): State<AppState>, request: Request<Body>| {
                    proxy_handler(state, service.clone(), mount.clone(), request)
                }
            };
            api = api
                .route(&format!("{}/{{*path}}", mount), any(handler.clone()))
                .route(&mount, any(handler));
        }
        api = api.merge(aggregated::routes());

        if let Some(verifier) = verifier {
            api = api.route_layer(middleware::from_fn_with_state(verifier, identity_middleware));
        }

        Router::new()
            .merge(api)
            .merge(admin::routes())
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                Duration::from_secs(config.timeouts.request_secs),
                enforce_deadline,
            ))
            .layer(RequestBodyLimitLayer::new(config.proxy.max_request_body_bytes))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static("X-Request-ID, X-Response-Time"),
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "HTTP server starting"
        );

        if self.config.health_check.monitor_enabled {
            let monitor = HealthMonitor::new(
                self.prober.clone(),
                Duration::from_secs(self.config.health_check.interval_secs),
            );
            let monitor_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Path below the service mount, without a leading slash. Percent-encoding
/// is preserved.
fn relative_path<'a>(path: &'a str, mount: &str) -> &'a str {
    path.strip_prefix(mount).unwrap_or(path).trim_start_matches('/')
}

/// Forward any request under a service mount.
async fn proxy_handler(state: AppState, service: String, mount: String, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let context = request_context(&parts);
    let request_id = context.request_id.clone();

    let result = async {
        let method = ProxyMethod::try_from(&parts.method)?;
        let body = axum::body::to_bytes(body, state.max_request_body_bytes)
            .await
            .map_err(|_| GatewayError::BadRequest("Request body could not be read".to_string()))?;

        let request = ProxyRequest::new(method, relative_path(parts.uri.path(), &mount), context)
            .with_headers(parts.headers.clone())
            .with_body(body)
            .with_identity(parts.extensions.get::<CallerIdentity>().cloned());
        let request = match parts.uri.query() {
            Some(query) => request.with_query(query),
            None => request,
        };

        state.forwarder.forward(&service, request).await
    }
    .await;

    match result {
        Ok(response) => {
            metrics::record_request(&service, parts.method.as_str(), response.status.as_u16(), start);
            response.into_response()
        }
        Err(e) => {
            e.log(&service, &request_id);
            metrics::record_request(&service, parts.method.as_str(), e.status().as_u16(), start);
            e.into_response_with(&request_id)
        }
    }
}
