//! `keyward tools`: print the tool catalog.

use anyhow::Result;
use clap::Args;
use keyward_mcp::ToolRegistry;

/// Arguments for `keyward tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    /// Print full definitions, including input schemas, as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the tools command.
pub fn execute(args: ToolsArgs) -> Result<()> {
    let registry = ToolRegistry::with_catalog();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    for tool in registry.list() {
        let read_only = tool
            .annotations
            .as_ref()
            .and_then(|a| a.read_only_hint)
            .unwrap_or(false);
        println!(
            "{:<26} {:<5} {}",
            tool.name,
            if read_only { "read" } else { "write" },
            tool.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
