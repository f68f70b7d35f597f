use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};

use shaperelay_agent::health::RelayStats;
use shaperelay_agent::pipeline::{DedupLedger, Dispatcher};
use shaperelay_agent::provider::CompletionProvider;
use shaperelay_agent::shapes::ShapesProvider;
use shaperelay_core::config::RelayConfig;
use shaperelay_discord::DiscordAdapter;

mod keepalive;

#[derive(Parser, Debug)]
#[command(name = "shaperelay", version, about = "Discord to Shapes completion relay")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "SHAPERELAY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shaperelay_gateway=info,shaperelay_agent=info,shaperelay_discord=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    // explicit path > SHAPERELAY_CONFIG > ./shaperelay.toml, then env overrides
    let config = RelayConfig::load(args.config.as_deref()).context("failed to load config")?;

    let provider = ShapesProvider::from_config(&config.shapes)
        .context("failed to build completion provider")?;
    let provider: Arc<dyn CompletionProvider> = Arc::new(provider);
    let model = config.shapes.model_identifier();
    info!(provider = provider.name(), model = %model, "completion provider ready");

    let stats = Arc::new(RelayStats::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&provider),
        model,
        DedupLedger::from_config(&config.dedup),
        Arc::clone(&stats),
    ));

    if config.keepalive.enabled {
        let state = Arc::new(keepalive::KeepAliveState {
            stats: Arc::clone(&stats),
            provider: provider.name().to_string(),
        });
        let keepalive_config = config.keepalive.clone();
        tokio::spawn(async move {
            if let Err(e) = keepalive::serve(&keepalive_config, state).await {
                error!(error = %e, "keep-alive listener stopped");
            }
        });
    }

    let adapter = DiscordAdapter::new(&config.discord, dispatcher)
        .context("failed to start Discord adapter")?;
    info!("relay starting");
    adapter.run().await;

    Ok(())
}
