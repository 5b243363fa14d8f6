//! agilow - HTTP Server Entry Point
//!
//! Starts the HTTP server that applies extracted operations to task boards.

use agilow::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agilow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: trello={} linear={} asana={}",
        config.trello.is_some(),
        config.linear.is_some(),
        config.asana.is_some()
    );

    api::serve(config).await?;

    Ok(())
}
