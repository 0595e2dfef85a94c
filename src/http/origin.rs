//! Origin gate service: verifies pass tokens in front of the application.
//!
//! # Responsibilities
//! - Run the verification gate on every inbound request
//! - Short-circuit denied requests with the fixed 403 before any further
//!   processing
//! - Forward allowed requests to the application upstream unchanged

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, uri::Authority, HeaderName, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::validation::ValidationError;
use crate::config::{ConfigError, ServiceConfig};
use crate::http::forward::{self, HttpClient};
use crate::noncestore::NonceStore;
use crate::observability::metrics;
use crate::token::PASS_HEADER;
use crate::verifier::{Decision, Verifier};

/// Application state shared by the gate middleware and the forward handler.
#[derive(Clone)]
pub struct OriginState {
    verifier: Arc<Verifier>,
    client: HttpClient,
    upstream: Authority,
    request_id_header: HeaderName,
    gate_enabled: bool,
}

/// HTTP server for the origin gate role.
pub struct OriginServer {
    router: Router,
}

impl OriginServer {
    /// Create a new origin gate from a validated configuration and a nonce
    /// store backend.
    pub fn new(config: ServiceConfig, store: Arc<dyn NonceStore>) -> Result<Self, ConfigError> {
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

        let state = OriginState {
            verifier: Arc::new(Verifier::new(&config.pass, store)),
            client: forward::new_client(&config.timeouts),
            upstream,
            request_id_header,
            gate_enabled: config.pass.enabled,
        };

        let router = Router::new()
            .route("/{*path}", any(origin_handler))
            .route("/", any(origin_handler))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(state, verify_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
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
        tracing::info!(address = %addr, "Origin gate starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Origin gate stopped");
        Ok(())
    }
}

/// Gate middleware: every request passes the verifier or dies here.
async fn verify_middleware(
    State(state): State<OriginState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.gate_enabled {
        return next.run(request).await;
    }

    // A header value that is not valid visible ASCII can never match the
    // grammar; treat it the same as an absent header.
    let header_value = request
        .headers()
        .get(PASS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
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

    match state
        .verifier
        .decide(header_value.as_deref(), &user_agent, &request_id)
        .await
    {
        Decision::Allow => {
            metrics::record_verification("allow");
            next.run(request).await
        }
        Decision::Deny(reason) => {
            tracing::warn!(
                request_id = %request_id,
                reason = reason.as_str(),
                "Pass verification denied"
            );
            metrics::record_verification(reason.as_str());
            deny_response()
        }
    }
}

/// The fixed rejection response, identical for every deny reason so the
/// wire leaks nothing about which check failed.
fn deny_response() -> Response {
    let mut response = Response::new(Body::from("403 Forbidden"));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=UTF-8"),
    );
    response
}

/// Forward an allowed request to the application upstream.
async fn origin_handler(State(state): State<OriginState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = forward::forward(&state.client, &state.upstream, request).await;
    metrics::record_request("origin", &method, response.status().as_u16(), start);
    response
}
