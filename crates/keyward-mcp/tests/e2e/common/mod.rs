//! Shared test infrastructure for Keyward MCP end-to-end tests.
//!
//! This module provides:
//! - An in-process fake secrets backend served by axum on a random port
//! - A test context wiring the real MCP router to that backend
//! - Helper functions for JSON-RPC calls and assertions

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use keyward_core::{CorsConfig, CorsMode};
use keyward_mcp::{
    CandidateValues, ClientFactory, HttpTransportState, McpServer, OriginGate, SESSION_ID_HEADER,
    create_router,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// =============================================================================
// FAKE BACKEND
// =============================================================================

/// The only token the fake backend accepts.
pub const VALID_TOKEN: &str = "s.valid";

/// One request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    /// Stored secrets keyed by full API path, e.g. `secret/data/app/db`.
    secrets: Mutex<BTreeMap<String, Value>>,
}

/// A Vault-compatible backend covering the endpoints the tools call.
///
/// Mounts: `secret/` (kv v2) and `legacy/` (kv v1). UI header listing is
/// always forbidden so posture runs carry one warning.
pub struct FakeVault {
    pub address: String,
    state: Arc<FakeState>,
}

impl FakeVault {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { address, state }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let path = uri.path().trim_start_matches("/v1/").to_string();
    let is_list = uri.query().is_some_and(|q| q.contains("list=true"));
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let token = header("x-vault-token");
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        token: token.clone(),
        namespace: header("x-vault-namespace"),
        body: body.clone(),
    });

    if token.as_deref() != Some(VALID_TOKEN) {
        return errors(StatusCode::FORBIDDEN, "permission denied");
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "sys/health") => Json(json!({
            "initialized": true,
            "sealed": false,
            "standby": false,
            "performance_standby": false,
            "version": "1.15.2",
            "cluster_name": "fake-cluster",
            "server_time_utc": 1_700_000_000
        }))
        .into_response(),
        ("GET", "sys/mounts") => Json(json!({
            "request_id": "req-1",
            "data": {
                "secret/": {"type": "kv", "description": "kv v2", "options": {"version": "2"}},
                "legacy/": {"type": "kv", "description": "kv v1", "options": null},
                "sys/": {"type": "system", "description": "system endpoints"}
            }
        }))
        .into_response(),
        ("GET", "sys/auth") => Json(json!({
            "data": {
                "token/": {"type": "token", "description": "token based credentials", "accessor": "auth_token_1"}
            }
        }))
        .into_response(),
        ("GET", "sys/audit") => Json(json!({ "data": {} })).into_response(),
        ("GET", "sys/policies/acl") if is_list => {
            Json(json!({ "data": { "keys": ["default", "root"] } })).into_response()
        }
        ("GET", "sys/config/ui/headers") => errors(StatusCode::FORBIDDEN, "permission denied"),
        ("GET", "sys/internal/ui/mounts/secret") => Json(json!({
            "data": {"type": "kv", "path": "secret/", "options": {"version": "2"}}
        }))
        .into_response(),
        ("GET", "sys/internal/ui/mounts/legacy") => Json(json!({
            "data": {"type": "kv", "path": "legacy/", "options": null}
        }))
        .into_response(),
        ("POST", p) if p.starts_with("sys/mounts/") => StatusCode::NO_CONTENT.into_response(),
        ("DELETE", p) if p.starts_with("sys/mounts/") => StatusCode::NO_CONTENT.into_response(),
        (_, p) if p.starts_with("secret/") || p == "legacy" || p.starts_with("legacy/") => {
            kv(&state, method.as_str(), p, is_list, body)
        }
        _ => errors(StatusCode::NOT_FOUND, ""),
    }
}

fn kv(state: &FakeState, method: &str, path: &str, is_list: bool, body: Option<Value>) -> Response {
    let mut secrets = state.secrets.lock().unwrap();
    let v2 = path.starts_with("secret/");

    if is_list {
        let prefix = if v2 {
            let rest = path.trim_start_matches("secret/metadata").trim_start_matches('/');
            data_key("secret/data", rest)
        } else {
            data_key("legacy", path.trim_start_matches("legacy").trim_start_matches('/'))
        };
        let prefix = format!("{prefix}/");
        let keys: BTreeSet<String> = secrets
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((folder, _)) => format!("{folder}/"),
                None => rest.to_string(),
            })
            .collect();
        if keys.is_empty() {
            return errors(StatusCode::NOT_FOUND, "");
        }
        return Json(json!({ "data": { "keys": keys } })).into_response();
    }

    match method {
        "GET" => match secrets.get(path) {
            Some(data) if v2 => Json(json!({
                "data": {"data": data, "metadata": {"version": 1, "destroyed": false}}
            }))
            .into_response(),
            Some(data) => Json(json!({ "data": data })).into_response(),
            None => errors(StatusCode::NOT_FOUND, ""),
        },
        "POST" => {
            let body = body.unwrap_or(Value::Null);
            let data = if v2 { body["data"].clone() } else { body };
            secrets.insert(path.to_string(), data);
            if v2 {
                Json(json!({
                    "data": {"version": 1, "created_time": "2024-01-01T00:00:00Z"}
                }))
                .into_response()
            } else {
                StatusCode::NO_CONTENT.into_response()
            }
        }
        "DELETE" => {
            secrets.remove(path);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => errors(StatusCode::METHOD_NOT_ALLOWED, ""),
    }
}

fn data_key(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

fn errors(status: StatusCode, message: &str) -> Response {
    let list: Vec<&str> = if message.is_empty() { vec![] } else { vec![message] };
    (status, Json(json!({ "errors": list }))).into_response()
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

/// The MCP HTTP router wired to a fresh fake backend.
pub struct TestContext {
    pub vault: FakeVault,
    pub server: Arc<McpServer>,
    app: Router,
}

/// Parsed HTTP response from the MCP router.
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl TestContext {
    /// Context with an empty environment snapshot.
    pub async fn setup() -> Self {
        Self::setup_with_env(|_| CandidateValues::default()).await
    }

    /// Context whose environment snapshot is derived from the fake backend.
    pub async fn setup_with_env(env: impl FnOnce(&FakeVault) -> CandidateValues) -> Self {
        let vault = FakeVault::start().await;
        let env = env(&vault);
        let server = Arc::new(McpServer::new(ClientFactory::default()));
        let gate = OriginGate::new(&CorsConfig {
            mode: CorsMode::Development,
            allowed_origins: Vec::new(),
        });
        let app = create_router(
            Arc::new(HttpTransportState::new(server.clone(), env)),
            Arc::new(gate),
        );
        Self { vault, server, app }
    }

    /// Headers pointing a request at the fake backend with a valid token.
    pub fn vault_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("x-vault-addr", self.vault.address.clone()),
            ("x-vault-token", VALID_TOKEN.to_string()),
        ]
    }

    pub async fn post(&self, uri: &str, body: &Value, headers: &[(&str, String)]) -> HttpReply {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn delete_session(&self, session_id: &str) -> StatusCode {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/mcp")
            .header(SESSION_ID_HEADER, session_id)
            .body(Body::empty())
            .unwrap();
        self.send(request).await.status
    }

    async fn send(&self, request: Request<Body>) -> HttpReply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).unwrap());
        HttpReply {
            status,
            headers,
            body,
        }
    }

    /// Run `initialize` with the given headers and return the minted session ID.
    pub async fn initialize(&self, headers: &[(&str, String)]) -> String {
        let reply = self
            .post("/mcp", &rpc(1, "initialize", json!({})), headers)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.headers[SESSION_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string()
    }

    /// Call a tool and return the JSON-RPC response body.
    pub async fn call_tool(
        &self,
        session_id: Option<&str>,
        name: &str,
        arguments: Value,
        headers: &[(&str, String)],
    ) -> Value {
        let mut headers = headers.to_vec();
        if let Some(session_id) = session_id {
            headers.push((SESSION_ID_HEADER, session_id.to_string()));
        }
        let body = rpc(
            2,
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        );
        let reply = self.post("/mcp", &body, &headers).await;
        assert_eq!(reply.status, StatusCode::OK, "tools/call {name}");
        reply.body.expect("tools/call returns a body")
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub fn rpc(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// The `result` of a successful tool call that did not report an error.
pub fn tool_json(response: &Value) -> Value {
    assert!(
        response.get("error").is_none(),
        "unexpected JSON-RPC error: {response}"
    );
    let result = &response["result"];
    assert_eq!(result["isError"], false, "tool reported an error: {result}");
    match &result["content"][0] {
        content if content["type"] == "json" => content["json"].clone(),
        content => content["text"].clone(),
    }
}

/// The text of a tool call that reported `isError: true`.
pub fn tool_error(response: &Value) -> String {
    let result = &response["result"];
    assert_eq!(result["isError"], true, "expected a tool error: {response}");
    result["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// The JSON-RPC error code of a failed call.
pub fn rpc_error_code(response: &Value) -> i64 {
    response["error"]["code"]
        .as_i64()
        .unwrap_or_else(|| panic!("expected a JSON-RPC error: {response}"))
}
