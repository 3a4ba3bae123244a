//! CLI command implementations for the Keyward MCP server.

pub mod check;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use clap::Args;
use keyward_core::{CorsConfig, CorsMode, KeywardConfig, Transport};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration file plus the flags that override it.
#[derive(Debug, Args)]
pub struct ConfigOverrides {
    /// Configuration file path. A missing file means defaults.
    #[arg(short, long, default_value = "keyward.yaml")]
    pub config: PathBuf,

    /// Transport type (stdio or http). Overrides config file.
    #[arg(long, env = "KEYWARD_TRANSPORT")]
    pub transport: Option<Transport>,

    /// HTTP listen host. Overrides config file.
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port (only for http transport). Overrides config file.
    #[arg(long, env = "KEYWARD_PORT")]
    pub port: Option<u16>,

    /// Origin checking mode: strict, development or disabled.
    #[arg(long, env = "KEYWARD_CORS_MODE")]
    pub cors_mode: Option<CorsMode>,

    /// Browser origin to allow. Repeatable; the env var is comma-separated.
    #[arg(
        long = "allowed-origin",
        env = "KEYWARD_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,
}

impl ConfigOverrides {
    /// Load the configuration file, apply the flags and validate the result.
    pub fn load(&self) -> Result<KeywardConfig> {
        let mut config = load_config_file(&self.config)?;
        self.apply(&mut config);
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", self.config.display()))?;
        Ok(config)
    }

    /// CLI values win over the file.
    fn apply(&self, config: &mut KeywardConfig) {
        if let Some(transport) = self.transport {
            config.mcp.transport = transport;
        }
        if let Some(host) = &self.host {
            config.mcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        if let Some(mode) = self.cors_mode {
            config.mcp.cors.mode = mode;
        }
        let origins: Vec<String> = self
            .allowed_origins
            .iter()
            .flat_map(|raw| CorsConfig::parse_origin_list(raw))
            .collect();
        if !origins.is_empty() {
            config.mcp.cors.allowed_origins = origins;
        }
    }
}

fn load_config_file(path: &Path) -> Result<KeywardConfig> {
    if path.exists() {
        KeywardConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    } else {
        warn!(config = %path.display(), "Config file not found, using defaults");
        Ok(KeywardConfig::default())
    }
}
