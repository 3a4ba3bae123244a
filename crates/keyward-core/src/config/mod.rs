//! Configuration types for Keyward.
//!
//! # Configuration File
//!
//! - **keyward.yaml**: transport, HTTP listener, origin policy, backend client
//!   timeouts and posture analysis settings.
//!
//! ```yaml
//! mcp:
//!   transport: http
//!   port: 8080
//!   cors:
//!     mode: development
//!     allowed_origins: ["https://console.example"]
//! vault:
//!   request_timeout_secs: 30
//! posture:
//!   check_timeout_secs: 15
//! ```

pub mod cors;
pub mod mcp;
pub mod posture;
pub mod vault;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use cors::{CorsConfig, CorsMode};
pub use mcp::{McpConfig, Transport};
pub use posture::PostureConfig;
pub use vault::VaultConfig;

/// Complete Keyward configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeywardConfig {
    /// MCP transport settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Backend client settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Posture analysis settings.
    #[serde(default)]
    pub posture: PostureConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeywardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mcp.is_http() && self.mcp.port == 0 {
            return Err(ConfigError::Config(
                "mcp.port must be non-zero for the http transport".to_string(),
            ));
        }
        if self.vault.request_timeout_secs == 0 {
            return Err(ConfigError::Config(
                "vault.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for origin in &self.mcp.cors.allowed_origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::Config(format!(
                    "allowed origin '{origin}' must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }
}
