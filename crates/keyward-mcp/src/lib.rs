//! # keyward-mcp
//!
//! MCP (Model Context Protocol) server exposing a Vault-compatible secrets
//! backend as typed tools for AI agents.
//!
//! - **Per-session credentials**: every request resolves backend address,
//!   token, namespace and TLS policy from headers, query and environment
//! - **Session registry**: one backend client per MCP session, built lazily
//! - **Origin gate**: strict, development and disabled CORS policies
//! - **Security posture**: a parallel or sequential report over health,
//!   audit, auth, policies, mounts and UI configuration
//! - **Multiple Transports**: stdio and HTTP
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ MCP protocol (POST /mcp, Mcp-Session-Id)
//!       ▼
//! ┌──────────────────────────┐
//! │  Keyward MCP Server      │
//! │  1. Origin gate          │  ← origin
//! │  2. Resolve credentials  │  ← credentials
//! │  3. Session client       │  ← session + vault::ClientFactory
//! │  4. Parse tool call      │  ← executor
//! │  5. Backend request(s)   │  ← vault / posture
//! │  6. Return JSON          │
//! └────────────┬─────────────┘
//!              │
//!              ▼
//!       Secrets backend
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use keyward_core::McpConfig;
//! use keyward_mcp::{CandidateValues, ClientFactory, HttpServer, McpServer};
//! use std::sync::Arc;
//!
//! let server = Arc::new(McpServer::new(ClientFactory::default()));
//! HttpServer::new(&McpConfig::default(), server, CandidateValues::from_process_env())
//!     .run()
//!     .await?;
//! ```

pub mod credentials;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod origin;
pub mod posture;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;
pub mod vault;

// Re-export main types
pub use credentials::{
    CandidateValues, CredentialBundle, CredentialSources, QueryTokenRejected, inspect_query,
    resolve,
};
pub use error::McpError;
pub use executor::{ExecutionResult, ToolCall, ToolExecutor};
pub use http_transport::{HttpServer, HttpTransportState, SESSION_ID_HEADER, create_router};
pub use origin::OriginGate;
pub use posture::{
    AnalyzeOptions, PostureBackend, PostureCheck, PostureError, SecurityReport, SecurityScope,
    analyze,
};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, RequestContext,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use session::SessionRegistry;
pub use tools::ToolRegistry;
pub use vault::{BackendError, ClientError, ClientFactory, VaultClient};
