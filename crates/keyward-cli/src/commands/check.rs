//! `keyward check`: validate configuration without starting a server.

use super::ConfigOverrides;
use anyhow::Result;
use clap::Args;

/// Arguments for `keyward check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Execute the check command. Prints the effective configuration as JSON.
pub fn execute(args: CheckArgs) -> Result<()> {
    let config = args.overrides.load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    eprintln!("Configuration OK: {}", args.overrides.config.display());
    Ok(())
}
