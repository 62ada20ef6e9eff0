use tracing_subscriber::EnvFilter;

use leasekeeper_core::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; `dev` forces `debug`.
pub fn init_logging(config: &LoggingConfig, dev: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, dev)));

    let installed = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn default_directive(config: &LoggingConfig, dev: bool) -> String {
    if dev {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}
