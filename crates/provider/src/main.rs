//! Proxmox VE Disk Provider binary
//!
//! Speaks the JSON-lines protocol on stdin/stdout. Logs go to stderr so
//! they never interleave with responses.

use std::io::Write;

use tokio::io::{stdin, stdout, BufReader};
use tracing::info;

use pvedisk_provider::config::ProviderConfig;
use pvedisk_provider::provider::PveProvider;
use pvedisk_provider::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting pvedisk provider {}", pvedisk_common::VERSION);

    let config_path = ProviderConfig::default_path();
    let config = ProviderConfig::load(&config_path)?.with_env();
    info!("Loaded configuration from {}", config_path.display());

    let provider = PveProvider::new(config);

    // Handshake: <protocol version>|<transport>|<encoding>
    let mut out = std::io::stdout();
    out.write_all(b"1|stdio|json\n")?;
    out.flush()?;

    server::serve(&provider, BufReader::new(stdin()), stdout()).await?;

    info!("Provider stopped");
    Ok(())
}
