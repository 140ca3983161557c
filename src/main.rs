//! Zeppelin server binary
//!
//! Loads configuration, opens the ledger, wires the betting service and
//! serves the HTTP/WebSocket surface.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zeppelin::{
    api::ApiServer,
    broadcast::BroadcastHub,
    channel::{ChannelInfo, KickChannelClient, StaticChannelInfo},
    config::{generate_sample_config, AppConfig, ConfigLoader, StorageBackend},
    games::{BettingService, GameConfigHandle, OutcomeGenerator},
    ledger::{AccountRepository, InMemoryRepository, JsonFileRepository, LedgerStore},
};

#[derive(Parser, Debug)]
#[command(name = "zeppelin")]
#[command(about = "Chat-driven zeppelin betting game server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Keep the ledger in memory only
    #[arg(long)]
    memory: bool,

    /// Write a sample configuration file to this path and exit
    #[arg(long)]
    generate_config: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    loader.validate(&config)?;
    Ok(config)
}

async fn open_repository(config: &AppConfig) -> Result<Arc<dyn AccountRepository>, Box<dyn std::error::Error>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory ledger; balances are lost on restart");
            Arc::new(InMemoryRepository::new())
        }
        StorageBackend::JsonFile => Arc::new(JsonFileRepository::open(&config.storage.data_file).await?),
    })
}

fn channel_info(config: &AppConfig) -> Result<Arc<dyn ChannelInfo>, Box<dyn std::error::Error>> {
    Ok(match &config.channel.slug {
        Some(_) => Arc::new(KickChannelClient::new(&config.channel)?),
        None => Arc::new(StaticChannelInfo::unavailable()),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = &args.generate_config {
        generate_sample_config(path)?;
        println!("Sample configuration written to {}", path);
        return Ok(());
    }

    let config = load_config(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    info!("Starting Zeppelin v{}", env!("CARGO_PKG_VERSION"));
    info!("   Storage: {:?} ({})", config.storage.backend, config.storage.data_file);
    info!("   Channel: {}", config.channel.slug.as_deref().unwrap_or("none"));

    let repository = open_repository(&config).await?;
    let ledger = Arc::new(LedgerStore::new(repository, config.registration));
    let hub = BroadcastHub::new();

    let service = Arc::new(
        BettingService::new(
            ledger,
            Arc::new(OutcomeGenerator::new()),
            GameConfigHandle::new(config.game)?,
            Arc::new(hub.clone()),
            channel_info(&config)?,
        )
        .with_channel_slug(config.channel.slug.clone()),
    );
    service.rebuild_aggregates().await?;

    ApiServer::new(config.server.clone(), service, hub).run().await
}
