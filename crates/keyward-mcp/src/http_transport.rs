//! HTTP transport for the MCP server.
//!
//! Streamable-HTTP style endpoints:
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `POST /mcp` | one JSON-RPC message; `initialize` mints a session |
//! | `DELETE /mcp` | ends the session named by `Mcp-Session-Id` |
//! | `GET /mcp` | 405, no server-initiated stream |
//! | `GET /health` | liveness |
//!
//! Layering, outermost first: request tracing, the origin gate, then (on
//! `/mcp` only) credential extraction, which rejects tokens in the query
//! string and attaches the resolved [`CredentialBundle`] to the request.

use crate::credentials::{
    CandidateValues, CredentialBundle, CredentialSources, inspect_query, resolve,
};
use crate::error::McpError;
use crate::origin::{OriginGate, enforce_origin};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestContext};
use crate::server::McpServer;
use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use keyward_core::McpConfig;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header carrying the MCP session ID, in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// HTTP transport handler state.
pub struct HttpTransportState {
    server: Arc<McpServer>,
    /// Environment snapshot taken at startup; the lowest-precedence source.
    env: CandidateValues,
}

impl HttpTransportState {
    /// Create a new HTTP transport state.
    pub fn new(server: Arc<McpServer>, env: CandidateValues) -> Self {
        Self { server, env }
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>, gate: Arc<OriginGate>) -> Router {
    let mcp = Router::new()
        .route(
            "/mcp",
            get(handle_mcp_get)
                .post(handle_mcp_post)
                .delete(handle_mcp_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            extract_credentials,
        ));

    Router::new()
        .merge(mcp)
        .route("/health", get(handle_health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(gate, enforce_origin))
        .layer(TraceLayer::new_for_http())
}

/// Resolve backend credentials for an `/mcp` request.
///
/// A token-bearing query parameter fails the request before anything else
/// looks at it.
async fn extract_credentials(
    State(state): State<Arc<HttpTransportState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let query_address = match inspect_query(request.uri().query()) {
        Ok(address) => address,
        Err(rejected) => {
            tracing::warn!(param = %rejected.param, "Rejected backend token in query string");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejected.to_string() })),
            )
                .into_response();
        }
    };

    let sources = CredentialSources {
        header: CandidateValues::from_headers(request.headers()),
        query_address,
        env: state.env.clone(),
    };
    request.extensions_mut().insert(resolve(&sources));
    next.run(request).await
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    Extension(credentials): Extension<CredentialBundle>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = McpError::SerializationError(e);
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(None, error.code(), error.to_string())),
            )
                .into_response();
        }
    };

    let minted = (request.method == "initialize").then(|| uuid::Uuid::new_v4().to_string());
    let session_id = minted.clone().or_else(|| session_id(&headers));
    let is_notification = request.is_notification();

    let context = RequestContext::new(session_id, credentials);
    let response = state.server.handle_request(request, &context).await;

    if is_notification {
        return StatusCode::ACCEPTED.into_response();
    }

    let mut http_response = (StatusCode::OK, Json(response)).into_response();
    if let Some(minted) = minted {
        if let Ok(value) = HeaderValue::from_str(&minted) {
            http_response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    http_response
}

/// Handle DELETE requests to /mcp (session teardown).
async fn handle_mcp_delete(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
) -> Response {
    match session_id(&headers) {
        Some(session_id) => {
            state.server.end_session(&session_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing Mcp-Session-Id header" })),
        )
            .into_response(),
    }
}

/// Handle GET requests to /mcp. Server-initiated streams are not offered.
async fn handle_mcp_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
        .into_response()
}

/// Handle health check requests.
async fn handle_health(State(state): State<Arc<HttpTransportState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "keyward",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.server.sessions().len()
    }))
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    bind_address: String,
    state: Arc<HttpTransportState>,
    gate: Arc<OriginGate>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(config: &McpConfig, server: Arc<McpServer>, env: CandidateValues) -> Self {
        Self {
            bind_address: config.bind_address(),
            state: Arc::new(HttpTransportState::new(server, env)),
            gate: Arc::new(OriginGate::new(&config.cors)),
        }
    }

    /// Run the HTTP server until Ctrl-C.
    pub async fn run(self) -> Result<(), McpError> {
        let cors_mode = self.gate.mode();
        let app = create_router(self.state, self.gate);

        let listener = tokio::net::TcpListener::bind(self.bind_address.as_str())
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("Failed to bind to {}: {}", self.bind_address, e))
            })?;

        tracing::info!(
            address = %self.bind_address,
            cors_mode = %cors_mode,
            "MCP HTTP server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        tracing::info!("MCP HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
