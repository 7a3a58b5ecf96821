use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pastebox::config::Config;
use pastebox::server::Server;

#[derive(Debug, Parser)]
#[command(name = "pastebox", about = "Text-paste sharing backend", version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, short, default_value = "config.json")]
    config: PathBuf,

    /// Start with built-in defaults when the config file is absent
    #[arg(long)]
    allow_missing_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pastebox=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if args.config.exists() {
        Config::load(&args.config)
            .with_context(|| format!("failed to load {}", args.config.display()))?
    } else if args.allow_missing_config {
        tracing::warn!(
            path = %args.config.display(),
            "config file not found, using built-in defaults"
        );
        Config::default()
    } else {
        anyhow::bail!(
            "config file {} not found (pass --allow-missing-config to run with defaults)",
            args.config.display()
        );
    };

    tracing::info!(
        bind_addr = %config.bind_addr,
        backend = if config.redis_url.is_some() { "redis" } else { "memory" },
        "starting pastebox"
    );

    let server = Server::new(&config).context("failed to initialize server")?;
    server.run().await.context("server error")?;

    Ok(())
}
