//! `keyward serve`: run the MCP server.

use super::ConfigOverrides;
use anyhow::{Context, Result};
use clap::Args;
use keyward_core::{KeywardConfig, Transport};
use keyward_mcp::{CandidateValues, ClientFactory, HttpServer, McpServer, SessionRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for `keyward serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.overrides.load()?;

    // Snapshot once; requests never read the live environment.
    let env = CandidateValues::from_process_env();
    log_startup(&config, &env);

    let server = Arc::new(build_server(&config));

    match config.mcp.transport {
        Transport::Stdio => server
            .run_stdio(env)
            .await
            .context("MCP stdio transport failed"),
        Transport::Http => HttpServer::new(&config.mcp, server, env)
            .run()
            .await
            .context("MCP HTTP transport failed"),
    }
}

fn build_server(config: &KeywardConfig) -> McpServer {
    McpServer::new(ClientFactory::new(&config.vault))
        .with_sessions(Arc::new(SessionRegistry::new()))
        .with_check_timeout(config.posture.check_timeout())
}

fn log_startup(config: &KeywardConfig, env: &CandidateValues) {
    info!(
        transport = %config.mcp.transport,
        version = env!("CARGO_PKG_VERSION"),
        "Starting Keyward MCP server"
    );
    info!(
        env_address = env.address.as_deref().unwrap_or("<unset>"),
        env_token = env.token.as_deref().is_some_and(|t| !t.trim().is_empty()),
        env_namespace = env.namespace.as_deref().unwrap_or("<unset>"),
        "Backend environment defaults"
    );

    if config.mcp.is_http() {
        info!(
            bind = %config.mcp.bind_address(),
            cors_mode = %config.mcp.cors.mode,
            allowed_origins = config.mcp.cors.allowed_origins.len(),
            "HTTP transport settings"
        );
        if config.mcp.cors.mode == keyward_core::CorsMode::Disabled {
            warn!("Origin checking is disabled; any website can reach this server from a browser");
        }
    } else if env.token.is_none() {
        warn!("VAULT_TOKEN is not set; stdio tool calls will fail until it is provided");
    }
}
