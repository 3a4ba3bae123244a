//! Origin validation and CORS headers for the HTTP transport.
//!
//! Browser requests carry an `Origin` header. The gate decides whether that
//! origin may talk to the server before any session or backend work happens:
//!
//! | Mode | Accepted origins |
//! |------|------------------|
//! | `strict` | exact allow-list matches |
//! | `development` | allow-list, plus `localhost` / `127.0.0.1` / `::1` on any port |
//! | `disabled` | everything |
//!
//! Requests without an `Origin` header (same-origin or non-browser callers)
//! bypass the gate and get no CORS headers.

use crate::credentials::{
    HEADER_VAULT_ADDR, HEADER_VAULT_NAMESPACE, HEADER_VAULT_SKIP_VERIFY, HEADER_VAULT_TOKEN,
};
use crate::http_transport::SESSION_ID_HEADER;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use keyward_core::{CorsConfig, CorsMode};
use serde_json::json;
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::{Host, Url};

/// Preflight cache lifetime, in seconds.
pub const CORS_MAX_AGE_SECS: u64 = 86_400;

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";

/// Decides which browser origins may call the server.
#[derive(Debug, Clone)]
pub struct OriginGate {
    mode: CorsMode,
    allowed_origins: HashSet<String>,
}

impl OriginGate {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            mode: config.mode,
            allowed_origins: config
                .allowed_origins
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    pub fn mode(&self) -> CorsMode {
        self.mode
    }

    /// Whether a request with this `Origin` header value may proceed.
    pub fn allow(&self, origin: &str) -> bool {
        match self.mode {
            CorsMode::Disabled => true,
            CorsMode::Strict => self.allowed_origins.contains(origin),
            CorsMode::Development => {
                self.allowed_origins.contains(origin) || is_loopback_origin(origin)
            }
        }
    }
}

/// `http(s)://localhost`, `127.0.0.1` or `[::1]`, any port.
fn is_loopback_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip == Ipv4Addr::LOCALHOST,
        Some(Host::Ipv6(ip)) => ip == Ipv6Addr::LOCALHOST,
        None => false,
    }
}

/// Axum middleware enforcing the gate.
///
/// Rejected origins get a 403 and the request never reaches a handler.
/// Accepted preflights are answered here with an empty 200.
pub async fn enforce_origin(
    State(gate): State<Arc<OriginGate>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(raw) = request.headers().get(header::ORIGIN) else {
        return next.run(request).await;
    };
    let Ok(origin) = raw.to_str().map(str::to_string) else {
        return forbidden("malformed Origin header");
    };

    if !gate.allow(&origin) {
        tracing::warn!(origin = %origin, mode = %gate.mode(), "Rejected cross-origin request");
        return forbidden("origin not allowed");
    }

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut(), &origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), &origin);
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &str) {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    let allowed_headers = [
        header::CONTENT_TYPE.as_str(),
        header::AUTHORIZATION.as_str(),
        SESSION_ID_HEADER,
        "mcp-protocol-version",
        HEADER_VAULT_ADDR,
        HEADER_VAULT_TOKEN,
        HEADER_VAULT_NAMESPACE,
        HEADER_VAULT_SKIP_VERIFY,
    ]
    .join(", ");

    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    if let Ok(value) = HeaderValue::from_str(&allowed_headers) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(SESSION_ID_HEADER),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(CORS_MAX_AGE_SECS));
}

fn forbidden(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
}
