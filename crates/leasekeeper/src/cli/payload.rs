use anyhow::{Context, Result};
use clap::Parser;

use leasekeeper_core::instance::normalize_name;
use leasekeeper_core::registry::InstancePayload;
use leasekeeper_core::LeaseKeeperConfig;
use leasekeeper_runtime::registry::resolve_ip;

use super::load_config;

/// Print the registration payload of one instance.
#[derive(Parser)]
pub struct PayloadCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "leasekeeper.toml")]
    pub config: String,

    /// Instance name.
    #[arg(short, long)]
    pub instance: String,
}

impl PayloadCommand {
    pub async fn execute(self) -> Result<()> {
        let config = load_config(&self.config)?;
        println!("{}", render_payload(&config, &self.instance).await?);
        Ok(())
    }
}

/// Build the XML body the register call would send for `name`.
async fn render_payload(config: &LeaseKeeperConfig, name: &str) -> Result<String> {
    let wanted = normalize_name(name);
    let instance = config
        .service_instances()
        .into_iter()
        .find(|i| i.name() == wanted)
        .with_context(|| format!("No instance named {} in configuration", wanted))?;

    let ip = resolve_ip(instance.host_address()).await;
    Ok(InstancePayload::new(&instance, ip).to_xml())
}
