use anyhow::Result;
use clap::Parser;
use console::style;

use super::load_config;

/// Check a configuration file without contacting the registry.
#[derive(Parser)]
pub struct ValidateCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "leasekeeper.toml")]
    pub config: String,
}

impl ValidateCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(&self.config)?;
        let policy = config.lifecycle.retry_policy();

        println!("{} {}", style("✓").green().bold(), self.config);
        for endpoint in config.registry.resolved_endpoints() {
            println!("  registry  {}", endpoint);
        }
        for instance in config.service_instances() {
            println!(
                "  instance  {}  {}://{}:{}  renew every {}s",
                instance.instance_id(),
                instance.scheme(),
                instance.host_address(),
                instance.active_port(),
                instance.lease_renewal_interval().as_secs()
            );
        }
        println!(
            "  retries   register x{}, heartbeat x{}, drain {}s",
            policy.max_registration_attempts,
            policy.max_heartbeat_retries,
            config.lifecycle.drain_timeout().as_secs()
        );
        Ok(())
    }
}
