use anyhow::Result;
use clap::Parser;
use console::style;

use leasekeeper::{init_logging, LeaseKeeper};

use super::load_config;

/// Register the configured instances and keep their leases alive.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "leasekeeper.toml")]
    pub config: String,

    /// Observability port (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Observability host (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Verbose logging.
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config(&self.config)?;

        if let Some(port) = self.port {
            config.observability.port = port;
        }
        if let Some(host) = self.host.clone() {
            config.observability.host = host;
        }

        init_logging(&config.observability.logging, self.dev)?;

        println!();
        println!(
            "  {} v{}",
            style("LeaseKeeper").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        for endpoint in config.registry.resolved_endpoints() {
            println!("  Registry   {}", style(endpoint).cyan());
        }
        for instance in config.service_instances() {
            println!("  Instance   {}", style(instance.instance_id()).green());
        }
        if config.observability.enabled {
            println!(
                "  Metrics    {}",
                style(format!(
                    "http://{}:{}/metrics",
                    config.observability.host, config.observability.port
                ))
                .cyan()
            );
        }
        if self.dev {
            println!("  Development mode enabled");
        }
        println!();

        tracing::info!("Loaded configuration from {}", self.config);

        let keeper = LeaseKeeper::builder().config(config).build()?;
        keeper.run().await?;

        println!("\n  {}", style("Stopped").bold());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        assert_eq!(cmd.config, "leasekeeper.toml");
        assert_eq!(cmd.port, None);
        assert!(!cmd.dev);
    }

    #[test]
    fn test_run_command_with_overrides() {
        let cmd = RunCommand::try_parse_from([
            "run", "--config", "custom.toml", "--port", "9100", "--host", "127.0.0.1", "--dev",
        ])
        .unwrap();
        assert_eq!(cmd.config, "custom.toml");
        assert_eq!(cmd.port, Some(9100));
        assert_eq!(cmd.host.as_deref(), Some("127.0.0.1"));
        assert!(cmd.dev);
    }
}
