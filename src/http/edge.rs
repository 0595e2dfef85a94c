//! Edge service: issues pass tokens and forwards requests toward origin.
//!
//! # Responsibilities
//! - Assign an edge request id when the client did not carry one
//! - Compute the signed pass token for every forwarded request
//! - Stamp `x-cf-pass` and forward the request otherwise unchanged

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, uri::Authority, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestId, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::validation::ValidationError;
use crate::config::{ConfigError, ServiceConfig};
use crate::http::forward::{self, HttpClient};
use crate::issuer::Issuer;
use crate::observability::metrics;
use crate::token::PASS_HEADER;

/// Application state injected into the edge handler.
#[derive(Clone)]
pub struct EdgeState {
    issuer: Arc<Issuer>,
    client: HttpClient,
    upstream: Authority,
    request_id_header: HeaderName,
    stamping_enabled: bool,
}

/// Generates a UUID v4 id for requests that arrived without one.
#[derive(Clone, Default)]
struct MakeEdgeRequestId;

impl MakeRequestId for MakeEdgeRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// HTTP server for the edge role.
pub struct EdgeServer {
    router: Router,
}

impl EdgeServer {
    /// Create a new edge server from a validated configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        let upstream: Authority = config.upstream.address.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::BadUpstreamAddress(
                config.upstream.address.clone(),
            )])
        })?;
        let request_id_header = HeaderName::from_bytes(config.pass.request_id_header.as_bytes())
            .map_err(|_| {
                ConfigError::Validation(vec![ValidationError::BadRequestIdHeader(
                    config.pass.request_id_header.clone(),
                )])
            })?;

        let state = EdgeState {
            issuer: Arc::new(Issuer::new(config.pass.secret.as_bytes())),
            client: forward::new_client(&config.timeouts),
            upstream,
            request_id_header: request_id_header.clone(),
            stamping_enabled: config.pass.enabled,
        };

        let router = Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(SetRequestIdLayer::new(request_id_header, MakeEdgeRequestId))
            .layer(TraceLayer::new_for_http())
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ));

        Ok(Self { router })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Edge server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Edge server stopped");
        Ok(())
    }
}

/// Stamp the pass header and forward toward origin.
async fn edge_handler(State(state): State<EdgeState>, mut request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    if state.stamping_enabled {
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let request_id = request
            .headers()
            .get(&state.request_id_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let token = state.issuer.issue(&user_agent, &request_id);
        let value = match HeaderValue::from_str(&token.to_string()) {
            Ok(value) => value,
            Err(e) => {
                // A request is stamped or it is not forwarded; never both
                // unsigned and forwarded.
                tracing::error!(error = %e, "Failed to encode pass header");
                metrics::record_request("edge", &method, 500, start);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Pass issuance failed")
                    .into_response();
            }
        };
        request
            .headers_mut()
            .insert(HeaderName::from_static(PASS_HEADER), value);

        metrics::record_token_issued();
        tracing::debug!(request_id = %request_id, nonce = %token.nonce, "Pass token stamped");
    }

    let response = forward::forward(&state.client, &state.upstream, request).await;
    metrics::record_request("edge", &method, response.status().as_u16(), start);
    response
}
