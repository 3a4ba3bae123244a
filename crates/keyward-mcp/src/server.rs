//! MCP server implementation.
//!
//! The server is transport-agnostic: transports hand it a parsed
//! [`JsonRpcRequest`] plus a [`RequestContext`] carrying the session ID and
//! the credentials resolved for that request.

use crate::credentials::{CandidateValues, CredentialSources, resolve};
use crate::error::McpError;
use crate::executor::{ExecutionResult, ToolCall, ToolExecutor};
use crate::posture::DEFAULT_CHECK_TIMEOUT;
use crate::protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
    RequestContext,
};
use crate::session::SessionRegistry;
use crate::tools::ToolRegistry;
use crate::vault::{ClientError, ClientFactory, VaultClient};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Session ID used by the stdio transport, which serves a single client.
pub const STDIO_SESSION_ID: &str = "stdio";

/// The MCP server.
pub struct McpServer {
    /// Registered tools.
    tools: ToolRegistry,
    /// Per-session backend clients.
    sessions: Arc<SessionRegistry>,
    /// Builds backend clients from request credentials.
    factory: ClientFactory,
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a server with the built-in tool catalog and an empty session registry.
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            tools: ToolRegistry::with_catalog(),
            sessions: Arc::new(SessionRegistry::new()),
            factory,
            executor: ToolExecutor::new(Some(DEFAULT_CHECK_TIMEOUT)),
        }
    }

    /// Use a shared session registry.
    pub fn with_sessions(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Bound each posture check. `None` disables the bound.
    pub fn with_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = ToolExecutor::new(timeout);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Drop the backend client of a session that has ended.
    pub fn end_session(&self, session_id: &str) {
        self.sessions.on_session_unregistered(session_id);
    }

    /// Run the server over stdin/stdout until stdin closes.
    ///
    /// Credentials come from the environment snapshot only.
    pub async fn run_stdio(&self, env: CandidateValues) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let context = RequestContext::new(
            Some(STDIO_SESSION_ID.to_string()),
            resolve(&CredentialSources::env_only(env)),
        );
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();

        let result = self.serve_lines(stdin, &mut stdout, &context).await;
        self.end_session(STDIO_SESSION_ID);
        result
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to `writer`.
    pub async fn serve_lines<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        context: &RequestContext,
    ) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) if request.is_notification() => {
                    self.handle_request(request, context).await;
                    continue;
                }
                Ok(request) => self.handle_request(request, context).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed JSON-RPC message");
                    error_response(None, McpError::SerializationError(e))
                }
            };

            let mut response_json = serde_json::to_vec(&response)?;
            response_json.push(b'\n');
            writer.write_all(&response_json).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        context: &RequestContext,
    ) -> JsonRpcResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return error_response(
                id,
                McpError::InvalidRequest(format!("unsupported jsonrpc version '{}'", request.jsonrpc)),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, context),
            "notifications/initialized" | "initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params, context).await,
            "shutdown" => self.handle_shutdown(id),
            other => error_response(id, McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&self, id: Option<Value>, context: &RequestContext) -> JsonRpcResponse {
        if let Some(session_id) = &context.session_id {
            self.sessions
                .on_session_registered(session_id, &context.credentials, &self.factory);
        }

        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": "keyward",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.tools.list() }))
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        context: &RequestContext,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return error_response(
                        id,
                        McpError::InvalidRequest(format!("invalid tools/call params: {e}")),
                    );
                }
            },
            None => {
                return error_response(id, McpError::InvalidRequest("missing params".to_string()));
            }
        };

        if !self.tools.contains(&params.name) {
            return error_response(id, McpError::ToolNotFound { name: params.name });
        }

        let call = match ToolCall::parse(&params.name, params.arguments) {
            Ok(call) => call,
            Err(e) => return error_response(id, e),
        };

        let client = match self.client_for(context) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    tool = call.name(),
                    session_id = context.session_id.as_deref().unwrap_or(""),
                    error = %e,
                    "No backend client for tool call"
                );
                return error_response(id, McpError::Configuration(e));
            }
        };

        let result = self.executor.execute(call, &client).await;
        execution_result_to_response(id, result)
    }

    /// Client for the request: the session's client, or a transient one
    /// when the request has no session.
    fn client_for(&self, context: &RequestContext) -> Result<Arc<VaultClient>, ClientError> {
        match &context.session_id {
            Some(session_id) => {
                self.sessions
                    .get_or_create(session_id, &context.credentials, &self.factory)
            }
            None => self.factory.create(&context.credentials).map(Arc::new),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn error_response(id: Option<Value>, error: McpError) -> JsonRpcResponse {
    JsonRpcResponse::error(id, error.code(), error.to_string())
}

fn execution_result_to_response(id: Option<Value>, result: ExecutionResult) -> JsonRpcResponse {
    let response = CallToolResponse {
        content: result.content,
        is_error: !result.success,
    };
    match serde_json::to_value(response) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => error_response(id, McpError::SerializationError(e)),
    }
}
