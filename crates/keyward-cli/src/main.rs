use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check::CheckArgs, serve::ServeArgs, tools::ToolsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "keyward",
    version,
    about = "MCP server for Vault-compatible secrets backends"
)]
struct Cli {
    /// Log filter, e.g. "info" or "keyward_mcp=debug". Logs go to stderr.
    #[arg(long, global = true, env = "KEYWARD_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server (stdio or HTTP).
    Serve(ServeArgs),

    /// Print the tool catalog.
    Tools(ToolsArgs),

    /// Validate a configuration file and print the effective settings.
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the stdio transport.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("Invalid log filter '{}'", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Serve(args) => commands::serve::execute(args).await,
        Command::Tools(args) => commands::tools::execute(args),
        Command::Check(args) => commands::check::execute(args),
    }
}
