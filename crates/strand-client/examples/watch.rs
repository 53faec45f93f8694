//! Subscribe to one resource and print every data-bus update.
//!
//! ```text
//! cargo run -p strand-client --example watch -- idea idea-123
//! ```
//!
//! Settings come from `~/.strand/settings.json` / `STRAND_*` env vars.

use std::sync::Arc;

use anyhow::{Context, Result};
use strand_bus::DataBus;
use strand_client::{ClientConfig, SyncProvider, WsConnector};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let resource_type = args.next().context("usage: watch <resourceType> <resourceId>")?;
    let resource_id = args.next().context("usage: watch <resourceType> <resourceId>")?;

    let settings = strand_settings::load_settings()?;
    let config = ClientConfig::from_settings(&settings.client);
    tracing::info!(url = %config.url, "connecting");

    let bus = Arc::new(DataBus::new());
    let mut updates = bus.subscribe();

    let provider = SyncProvider::new(config, Arc::new(WsConnector));
    provider.activate(bus.clone())?;
    provider.subscribe_resource(resource_type, resource_id)?;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    println!("{} = {}", update.path.join("/"), update.value);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bus receive error");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                provider.deactivate().await?;
                return Ok(());
            }
        }
    }
}
