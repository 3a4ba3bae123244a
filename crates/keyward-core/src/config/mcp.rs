//! MCP server configuration.
//!
//! This module defines how the MCP server is exposed: which transport it
//! speaks and, for HTTP, where it listens and which browser origins it admits.

use super::cors::CorsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Transport type: "stdio" or "http".
    #[serde(default)]
    pub transport: Transport,

    /// HTTP host (only used when transport is HTTP).
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP port (only used when transport is HTTP).
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Cross-origin policy for the HTTP transport.
    #[serde(default)]
    pub cors: CorsConfig,
}

/// MCP transport type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Standard input/output transport (for desktop clients).
    #[default]
    Stdio,
    /// Streamable HTTP transport.
    Http,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(format!("unknown transport '{other}', use 'stdio' or 'http'")),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http => f.write_str("http"),
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_http_host(),
            port: default_http_port(),
            cors: CorsConfig::default(),
        }
    }
}

impl McpConfig {
    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if using HTTP transport.
    pub fn is_http(&self) -> bool {
        self.transport == Transport::Http
    }
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}
