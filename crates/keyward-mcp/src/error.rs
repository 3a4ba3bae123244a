//! Error types for the MCP crate.

use crate::vault::ClientError;
use thiserror::Error;

/// JSON-RPC code for credential and backend configuration errors.
pub const CONFIGURATION_ERROR_CODE: i32 = -32001;

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown JSON-RPC method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Tool not found.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// No usable backend client could be built from the request credentials.
    #[error("backend configuration error: {0}")]
    Configuration(#[from] ClientError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::ToolNotFound { .. } | McpError::InvalidArguments { .. } => -32602,
            McpError::SerializationError(_) => -32700,
            McpError::Configuration(_) => CONFIGURATION_ERROR_CODE,
            _ => -32603,
        }
    }
}
