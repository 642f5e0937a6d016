//! Lookup server entry point.

use anyhow::{Context, Result};
use clap::Parser;
use cpedict_core::{AppConfig, BuildInfo};
use cpedict_server::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cpedictd")]
#[command(about = "CPE dictionary lookup server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(long, env = "CPEDICT_CONFIG", default_value = "cpedict.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("cpedictd v{}", env!("CARGO_PKG_VERSION"));

    // Config file is optional; env vars and defaults can provide everything.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("CPEDICT_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .dictionary
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid dictionary configuration")?;

    let build = BuildInfo::current();
    let store = cpedict_dictionary::from_config(&config.dictionary)
        .await
        .context("failed to open dictionary store")?;

    // Catch connectivity problems before accepting requests.
    store
        .health_check()
        .await
        .context("dictionary health check failed")?;
    tracing::info!(dialect = config.dictionary.dialect(), "Dictionary store opened");

    let state = AppState::new(store.clone(), build);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await.context("failed to close store")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
