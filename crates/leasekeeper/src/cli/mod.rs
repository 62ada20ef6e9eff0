mod payload;
mod run;
mod validate;

pub use payload::PayloadCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// LeaseKeeper - keeps service instances registered with a Eureka registry
#[derive(Parser)]
#[command(name = "leasekeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Register the configured instances and keep their leases alive.
    Run(RunCommand),

    /// Check a configuration file without contacting the registry.
    Validate(ValidateCommand),

    /// Print the registration payload of one instance.
    Payload(PayloadCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Validate(cmd) => cmd.execute(),
            Commands::Payload(cmd) => cmd.execute().await,
        }
    }
}

/// Load and validate a configuration file.
fn load_config(path: &str) -> Result<leasekeeper_core::LeaseKeeperConfig> {
    if !std::path::Path::new(path).exists() {
        anyhow::bail!("Configuration file not found: {}", path);
    }
    let config = leasekeeper_core::LeaseKeeperConfig::from_file(path)?;
    config.validate()?;
    Ok(config)
}
